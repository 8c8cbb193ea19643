//! Trigger decisions handed from the engine to the scheduler.

use serde::Serialize;

use crate::types::{Branch, BuilderName, Revision};

/// Why a trigger was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerOrigin {
    /// The submission message asked for rebuilds.
    Requested,

    /// A job failed and the revision was within its unconditional budget.
    /// The runs have already been charged to the revision.
    Failure,

    /// A job failed after the revision exhausted its unconditional budget.
    ///
    /// The trigger only proceeds if `issued` runs are still a tolerable share
    /// of the revision's jobs, which the scheduler learns from the lookup.
    /// The runs are charged to the revision only if it proceeds.
    FailureOverLimit { issued: u32 },
}

/// A decision to run `count` more instances of a builder on a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerRequest {
    pub branch: Branch,
    pub revision: Revision,
    pub builder: BuilderName,
    pub count: u32,
    pub origin: TriggerOrigin,
}

impl TriggerRequest {
    pub fn is_failure(&self) -> bool {
        !matches!(self.origin, TriggerOrigin::Requested)
    }
}

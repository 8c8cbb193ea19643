//! Quota rules and the user allow-list.
//!
//! Failure triggers are rationed per revision in two stages. While fewer than
//! `lower_trigger_limit` runs have been issued, every failing builder gets its
//! retries. Past that, a failing builder only gets retries while
//! `issued * tolerance_factor <= rev_total`, i.e. while the bot has
//! retriggered no more than one in `tolerance_factor` of the push's jobs.

use std::collections::HashSet;

/// Outcome of the unconditional stage of the failure quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAllowance {
    /// Within the unconditional budget.
    Granted,
    /// Budget exhausted; the tolerance check decides once `rev_total` is known.
    NeedsTolerance { issued: u32 },
}

/// Applies the unconditional stage.
pub fn failure_allowance(issued: u32, lower_trigger_limit: u32) -> FailureAllowance {
    if issued < lower_trigger_limit {
        FailureAllowance::Granted
    } else {
        FailureAllowance::NeedsTolerance { issued }
    }
}

/// Applies the tolerance stage. Returns true if the trigger may proceed.
pub fn within_tolerance(issued: u32, tolerance_factor: u32, rev_total: usize) -> bool {
    u64::from(issued) * u64::from(tolerance_factor) <= rev_total as u64
}

/// Submitters whose pushes may actually be retriggered.
///
/// Triggers for anyone else are still decided and counted, but the call to
/// the build API is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowList {
    Everyone,
    Only(HashSet<String>),
}

impl AllowList {
    pub fn only<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AllowList::Only(users.into_iter().map(Into::into).collect())
    }

    /// Returns true if the submitter may be retriggered. Unknown submitters
    /// are only permitted when everyone is.
    pub fn permits(&self, user: Option<&str>) -> bool {
        match self {
            AllowList::Everyone => true,
            AllowList::Only(users) => user.is_some_and(|u| users.contains(u)),
        }
    }
}

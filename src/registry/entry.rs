//! Per-revision trigger state.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::try_syntax::TryRequest;
use crate::types::{Branch, BuilderName, Revision};

/// Explicit rebuild counts requested in a submission message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedCounts {
    /// Runs per ordinary test job.
    pub test: u32,
    /// Runs per talos job.
    pub talos: u32,
}

impl RequestedCounts {
    /// Returns the count that applies to a builder.
    pub fn for_builder(&self, builder: &BuilderName) -> u32 {
        if builder.is_talos() {
            self.talos
        } else {
            self.test
        }
    }
}

/// How a revision may be retriggered, decided once when it is registered.
///
/// An explicit rebuild request and automatic failure retries never coexist:
/// a request takes precedence and disables failure retries for the push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Trigger the requested counts when each job starts.
    RequestedOnly { counts: RequestedCounts },

    /// Trigger `count` extra runs of each failing job.
    FailureRetryOnly { count: u32 },

    /// The submitter opted out of retries.
    None,
}

impl TriggerPolicy {
    /// Derives the policy from a parsed try directive.
    pub fn from_request(request: &TryRequest, default_retry: u32) -> Self {
        if request.has_rebuilds() {
            TriggerPolicy::RequestedOnly {
                counts: RequestedCounts {
                    test: request.rebuild,
                    talos: request.rebuild_talos,
                },
            }
        } else if request.retry {
            TriggerPolicy::FailureRetryOnly {
                count: default_retry,
            }
        } else {
            TriggerPolicy::None
        }
    }

    /// Returns the requested counts, if this is a requested-trigger policy.
    pub fn requested(&self) -> Option<RequestedCounts> {
        match self {
            TriggerPolicy::RequestedOnly { counts } => Some(*counts),
            _ => None,
        }
    }

    /// Returns the failure retry count, if this is a failure-retry policy.
    pub fn fail_retrigger(&self) -> Option<u32> {
        match self {
            TriggerPolicy::FailureRetryOnly { count } => Some(*count),
            _ => None,
        }
    }
}

/// Trigger state for one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub revision: Revision,
    pub branch: Branch,
    pub policy: TriggerPolicy,

    /// Failure-driven runs issued so far for this revision.
    pub rev_trigger_count: u32,

    /// Builders already acted on. Guarantees at most one action per builder.
    pub seen_builders: BTreeSet<BuilderName>,

    /// Submitter, checked against the allow-list before triggering.
    pub user: Option<String>,

    /// When the revision was first registered. Eviction removes the oldest first.
    pub time_seen: DateTime<Utc>,

    /// Registration order, breaks ties between equal `time_seen` values.
    #[serde(skip)]
    pub(super) seq: u64,
}

impl RevisionEntry {
    /// Marks a builder as acted on.
    ///
    /// Returns false if it was already marked, in which case the caller must not act.
    pub fn mark_seen(&mut self, builder: &BuilderName) -> bool {
        self.seen_builders.insert(builder.clone())
    }

    /// Returns true if the builder was already acted on.
    pub fn has_seen(&self, builder: &BuilderName) -> bool {
        self.seen_builders.contains(builder)
    }
}

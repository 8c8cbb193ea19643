//! Build lifecycle events as seen by the trigger engine.

use serde::{Deserialize, Serialize};

use super::ids::{Branch, BuilderName, Revision};

/// Which half of a job's lifecycle a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Started,
    Finished,
}

impl LifecyclePhase {
    /// Classifies a bus routing key such as `build.try-linux64-...-test-xpcshell.7.finished`.
    ///
    /// Returns `None` if the key names neither phase.
    pub fn from_routing_key(key: &str) -> Option<Self> {
        if key.ends_with("started") {
            Some(LifecyclePhase::Started)
        } else if key.ends_with("finished") {
            Some(LifecyclePhase::Finished)
        } else {
            None
        }
    }
}

/// Result of a job as reported by the build system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// No result yet (the job is still running).
    Pending,
    /// Result code 0.
    Success,
    /// Result code 1: test failures or warnings.
    Failure,
    /// Result code 2: exception or infrastructure failure.
    Exception,
    /// Any other result code (skipped, retry, cancelled, ...).
    Other(i64),
}

impl BuildStatus {
    /// Maps the build system's numeric result code.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            None => BuildStatus::Pending,
            Some(0) => BuildStatus::Success,
            Some(1) => BuildStatus::Failure,
            Some(2) => BuildStatus::Exception,
            Some(other) => BuildStatus::Other(other),
        }
    }

    /// Returns true for the two statuses that make a job a retrigger candidate.
    pub fn is_failure(&self) -> bool {
        matches!(self, BuildStatus::Failure | BuildStatus::Exception)
    }
}

/// A normalized build lifecycle notification, the engine's only input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub phase: LifecyclePhase,
    pub branch: Branch,
    pub revision: Revision,
    pub builder: BuilderName,
    pub status: BuildStatus,
    /// Submission message; empty when the notification carried no `try:` directive.
    pub comments: String,
    /// Submitting identity, if known.
    pub user: Option<String>,
}

//! Delayed re-lookup schedule.

use std::time::Duration;

use crate::config::EngineConfig;
use crate::engine::TriggerRequest;
use crate::types::{Branch, BuilderName, Revision};

/// How often, and how long apart, a trigger is re-attempted when the build
/// API has nothing recorded for its builder yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySchedule {
    pub delay: Duration,
    /// Re-attempts after the first lookup. A trigger is looked up at most
    /// `max_attempts + 1` times.
    pub max_attempts: u32,
}

impl RetrySchedule {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        RetrySchedule {
            delay,
            max_attempts,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.retry_delay, config.max_attempts)
    }

    /// Returns the attempt number to schedule after `attempt`, or `None` once
    /// the schedule is exhausted.
    pub fn next_attempt(&self, attempt: u32) -> Option<u32> {
        let next = attempt.checked_add(1)?;
        (next <= self.max_attempts).then_some(next)
    }
}

/// Identifies one scheduled re-attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetryKey {
    pub branch: Branch,
    pub revision: Revision,
    pub builder: BuilderName,
    pub attempt: u32,
}

impl RetryKey {
    pub fn new(request: &TriggerRequest, attempt: u32) -> Self {
        RetryKey {
            branch: request.branch.clone(),
            revision: request.revision.clone(),
            builder: request.builder.clone(),
            attempt,
        }
    }
}

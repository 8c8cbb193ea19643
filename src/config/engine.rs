//! Retrigger policy configuration.

use std::time::Duration;

use crate::registry::RegistrationConfig;

/// Default failure retries per failing builder.
const DEFAULT_RETRY: u32 = 2;

/// Default number of failing builders a push may have before the tolerance
/// check kicks in.
const DEFAULT_PER_PUSH_FAILURES: u32 = 5;

/// Default tolerance: roughly one in 33 of a push's jobs may be retriggered.
const DEFAULT_TOLERANCE_FACTOR: u32 = 33;

/// Default ceiling for requested rebuild counts.
const DEFAULT_REQUESTED_LIMIT: u32 = 20;

/// Default registry capacity.
const DEFAULT_REVMAP_THRESHOLD: usize = 2000;

/// Default delay before re-looking up a builder with no identifiers yet.
const DEFAULT_RETRY_DELAY_SECS: u64 = 90;

/// Default number of delayed lookups before giving up.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default number of processed events between hidden-builder refreshes.
const DEFAULT_HIDDEN_REFRESH_EVENTS: u64 = 500;

/// Default number of concurrent outbound trigger executions.
const DEFAULT_TRIGGER_WORKERS: usize = 4;

/// Retrigger policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Failure retries granted to each failing builder of a push that did not
    /// request explicit rebuilds.
    ///
    /// Default: 2. Configure via `TB_DEFAULT_RETRY`.
    pub default_retry: u32,

    /// Failing builders a push may have before retries become rationed.
    ///
    /// Default: 5. Configure via `TB_PER_PUSH_FAILURES`.
    pub per_push_failures: u32,

    /// Failure-driven runs granted to a revision unconditionally.
    ///
    /// Past this, a failure trigger is only issued while the runs already
    /// issued, multiplied by `tolerance_factor`, stay within the revision's
    /// total job count. Defaults to `default_retry * per_push_failures`.
    pub lower_trigger_limit: u32,

    /// Inverse of the proportion of a push's jobs that may be retriggered.
    ///
    /// Default: 33. Configure via `TB_TOLERANCE_FACTOR`.
    pub tolerance_factor: u32,

    /// Ceiling for each requested rebuild count.
    ///
    /// Default: 20. Configure via `TB_REQUESTED_LIMIT`.
    pub requested_limit: u32,

    /// Registry size that triggers eviction.
    ///
    /// Default: 2000. Configure via `TB_REVMAP_THRESHOLD`.
    pub revmap_threshold: usize,

    /// Delay before looking a builder up again when the build API has no
    /// identifiers for it yet.
    ///
    /// Default: 90 seconds. Configure via `TB_RETRY_DELAY_SECS`.
    pub retry_delay: Duration,

    /// Delayed lookups attempted before giving up.
    ///
    /// Default: 5. Configure via `TB_MAX_ATTEMPTS`.
    pub max_attempts: u32,

    /// Processed events between hidden-builder refreshes.
    ///
    /// Default: 500. Configure via `TB_HIDDEN_REFRESH_EVENTS`.
    pub hidden_refresh_interval: u64,

    /// Concurrent outbound trigger executions.
    ///
    /// Default: 4. Configure via `TB_TRIGGER_WORKERS`.
    pub trigger_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        EngineConfig {
            default_retry: DEFAULT_RETRY,
            per_push_failures: DEFAULT_PER_PUSH_FAILURES,
            lower_trigger_limit: DEFAULT_RETRY * DEFAULT_PER_PUSH_FAILURES,
            tolerance_factor: DEFAULT_TOLERANCE_FACTOR,
            requested_limit: DEFAULT_REQUESTED_LIMIT,
            revmap_threshold: DEFAULT_REVMAP_THRESHOLD,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            hidden_refresh_interval: DEFAULT_HIDDEN_REFRESH_EVENTS,
            trigger_workers: DEFAULT_TRIGGER_WORKERS,
        }
    }

    /// Creates a configuration from `TB_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(super::env_lookup)
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// `lower_trigger_limit` is derived from the (possibly overridden)
    /// `default_retry` and `per_push_failures`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            default: T,
        ) -> T {
            lookup(key)
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(default)
        }

        let default_retry = parsed(&lookup, "TB_DEFAULT_RETRY", DEFAULT_RETRY);
        let per_push_failures = parsed(&lookup, "TB_PER_PUSH_FAILURES", DEFAULT_PER_PUSH_FAILURES);

        EngineConfig {
            default_retry,
            per_push_failures,
            lower_trigger_limit: default_retry.saturating_mul(per_push_failures),
            tolerance_factor: parsed(&lookup, "TB_TOLERANCE_FACTOR", DEFAULT_TOLERANCE_FACTOR),
            requested_limit: parsed(&lookup, "TB_REQUESTED_LIMIT", DEFAULT_REQUESTED_LIMIT),
            revmap_threshold: parsed(&lookup, "TB_REVMAP_THRESHOLD", DEFAULT_REVMAP_THRESHOLD),
            retry_delay: Duration::from_secs(parsed(
                &lookup,
                "TB_RETRY_DELAY_SECS",
                DEFAULT_RETRY_DELAY_SECS,
            )),
            max_attempts: parsed(&lookup, "TB_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            hidden_refresh_interval: parsed(
                &lookup,
                "TB_HIDDEN_REFRESH_EVENTS",
                DEFAULT_HIDDEN_REFRESH_EVENTS,
            ),
            trigger_workers: parsed(&lookup, "TB_TRIGGER_WORKERS", DEFAULT_TRIGGER_WORKERS).max(1),
        }
    }

    /// Overrides the unconditional failure-trigger budget.
    pub fn with_lower_trigger_limit(mut self, limit: u32) -> Self {
        self.lower_trigger_limit = limit;
        self
    }

    /// Overrides the registry capacity.
    pub fn with_revmap_threshold(mut self, threshold: usize) -> Self {
        self.revmap_threshold = threshold;
        self
    }

    /// Overrides the delayed-lookup schedule.
    pub fn with_retry_schedule(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.retry_delay = delay;
        self.max_attempts = max_attempts;
        self
    }

    /// The subset of settings the registry needs when seeding entries.
    pub fn registration(&self) -> RegistrationConfig {
        RegistrationConfig {
            default_retry: self.default_retry,
            requested_limit: self.requested_limit,
        }
    }
}

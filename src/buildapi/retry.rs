//! Exponential backoff for transient build API failures.
//!
//! This is the transport-level retry: a lookup that failed with a 5xx, 429
//! or network error is repeated a few times before the error surfaces.
//! Only idempotent GETs go through it.
//! It is unrelated to the delayed re-lookup that happens when the build API
//! simply has no identifiers for a builder yet (see `scheduler`).
//!
//! Default: 3 retries with 2s, 4s, 8s delays.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::{BuildApiError, BuildApiErrorKind};

/// Configuration for exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,

    pub initial_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,

    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// 3 retries with 2s, 4s, 8s delays (about 14 seconds in total).
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        initial_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(16),
        backoff_multiplier: 2.0,
    };

    /// No retries at all.
    pub const NONE: Self = Self {
        max_retries: 0,
        ..Self::DEFAULT
    };

    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `initial_delay * backoff_multiplier^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation`, retrying transient errors according to `config`.
///
/// Permanent and malformed-response errors are returned at once. A transient
/// error is returned once `config.max_retries` retries have also failed.
pub async fn retry_with_backoff<T, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, BuildApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BuildApiError>>,
{
    let mut delays = config.delays();
    let mut attempts = 1;

    loop {
        let e = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind != BuildApiErrorKind::Transient => return Err(e),
            Err(e) => e,
        };

        let Some(delay) = delays.next() else {
            warn!(attempts, error = %e, "Giving up on build API request");
            return Err(e);
        };
        debug!(attempts, ?delay, error = %e, "Retrying build API request");
        tokio::time::sleep(delay).await;
        attempts += 1;
    }
}

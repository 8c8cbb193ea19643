//! Trigger execution and delayed retry.
//!
//! The engine decides *that* a builder should run again; this module works out
//! *what* to rebuild. Each [`TriggerRequest`](crate::engine::TriggerRequest)
//! is resolved against the build API lookup:
//!
//! 1. Malformed revisions are rejected without any upstream call.
//! 2. Requests for evicted revisions become no-ops.
//! 3. Requests from submitters outside the allow-list are accounted and
//!    dropped before any lookup.
//! 4. A builder that already has more runs than requested is left alone.
//! 5. Over-limit failure triggers must pass the tolerance check, which is
//!    re-run under the registry lock when the runs are charged.
//! 6. With no build or request id recorded yet, the request is retried after
//!    a delay, a bounded number of times.
//! 7. Otherwise the trigger is accounted and sent.
//!
//! Executions run on a [`TriggerPool`] so that upstream latency never stalls
//! the event loop.

mod executor;
mod pool;
mod retry;

#[cfg(test)]
mod tests;

pub use executor::{TriggerExecutor, TriggerOutcome};
pub use pool::TriggerPool;
pub use retry::{RetryKey, RetrySchedule};

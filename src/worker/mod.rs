//! Event worker for build notification processing.
//!
//! A single worker consumes notifications in delivery order, which the
//! engine relies on (a job's start is seen before its finish). Trigger
//! executions are handed to the bounded [`TriggerPool`](crate::scheduler::TriggerPool),
//! so upstream latency never holds up the next notification.
//!
//! # Module Structure
//!
//! - [`message`]: Worker message types for async communication
//! - [`worker`]: The event loop itself

mod message;
#[allow(clippy::module_inception)]
mod worker;


pub use message::WorkerMessage;
pub use worker::{EventWorker, Result, WorkerError};

//! Retrigger decision engine.
//!
//! [`TriggerEngine`] consumes normalized [`BuildEvent`](crate::types::BuildEvent)s
//! and decides which builders to run again. It owns the revision registry,
//! the hidden-builder set, the user allow-list and the process-wide counters,
//! so independent engines never share state.
//!
//! The engine never talks to the build API itself. It returns
//! [`TriggerRequest`]s, which the scheduler resolves against the build API,
//! re-checks against the tolerance quota and executes.
//!
//! # Example
//!
//! ```
//! use trigger_bot::config::EngineConfig;
//! use trigger_bot::engine::{AllowList, TriggerEngine};
//! use trigger_bot::types::{BuildEvent, BuildStatus, LifecyclePhase, Revision};
//!
//! # tokio_test_block(async {
//! let engine = TriggerEngine::new(EngineConfig::new(), AllowList::Everyone);
//! let event = BuildEvent {
//!     phase: LifecyclePhase::Finished,
//!     branch: "try".into(),
//!     revision: Revision::new("0123456789ab"),
//!     builder: "Ubuntu VM 12.04 try opt test xpcshell".into(),
//!     status: BuildStatus::Failure,
//!     comments: "try: -b o -p linux -u xpcshell -t none".into(),
//!     user: None,
//! };
//!
//! let requests = engine.handle_event(&event).await;
//! assert_eq!(requests.len(), 1);
//! assert_eq!(requests[0].count, 2);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod decision;
mod quota;
mod request;


pub use decision::{EngineStats, FailureCharge, TriggerEngine};
pub use quota::{AllowList, FailureAllowance, failure_allowance, within_tolerance};
pub use request::{TriggerOrigin, TriggerRequest};

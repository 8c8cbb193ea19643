//! Core domain types for the trigger bot.
//!
//! This module contains the identifiers and event shapes used throughout the
//! application, designed to encode invariants via the type system.

pub mod event;
pub mod ids;

pub use event::{BuildEvent, BuildStatus, LifecyclePhase};
pub use ids::{Branch, BuildId, BuilderName, InvalidRevision, RequestId, Revision};

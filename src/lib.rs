//! Trigger Bot - retriggers failing or explicitly requested try jobs.
//!
//! This library provides the decision engine and the plumbing around it:
//! notification intake, the build API clients, and delayed trigger execution.

pub mod buildapi;
pub mod config;
pub mod engine;
pub mod notifications;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod stats;
pub mod try_syntax;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_utils;

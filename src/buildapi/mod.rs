//! Build API collaborators.
//!
//! The engine needs three things from the outside world: the builds recorded
//! for a revision ([`BuildLookup`]), a way to enqueue more runs
//! ([`RebuildTrigger`]) and the set of builders operators have hidden
//! ([`BuilderVisibility`]). This module defines those traits and their HTTP
//! implementations.
//!
//! # Endpoints
//!
//! - `GET {root}/{branch}/rev/{revision}?format=json` - records for a revision
//! - `POST {root}/{branch}/build` with `build_id`, `count` - rebuild a build
//! - `POST {root}/{branch}/request` with `request_id`, `count` - rebuild a request
//! - `GET {root}/{branch}?date=YYYY-MM-DD&format=json` - a day's jobs
//! - `GET {visibility}/{branch}/rev/{revision}/builders` - builder visibility

mod client;
mod error;
mod records;
mod retry;
mod services;
mod visibility;

pub use client::BuildApiClient;
pub use error::{BuildApiError, BuildApiErrorKind};
pub use records::{BuildRecord, LookupSummary, RebuildTarget};
pub use retry::{RetryConfig, retry_with_backoff};
pub use services::{BuildLookup, BuilderVisibility, BuilderVisibilityRecord, RebuildTrigger};
pub use visibility::VisibilityClient;

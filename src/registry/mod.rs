//! Registry of revisions the bot has seen and what it has done for them.
//!
//! Each revision gets a [`RevisionEntry`] the first time a notification with a
//! submission message arrives for it. The entry records the revision's
//! [`TriggerPolicy`], the builders already acted on, and how many failure
//! triggers were issued. The registry is bounded; see [`revmap`] for eviction.

mod entry;
pub mod revmap;

pub use entry::{RequestedCounts, RevisionEntry, TriggerPolicy};
pub use revmap::{RegistrationConfig, RevisionRegistry};

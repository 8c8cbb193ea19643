//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifiers (e.g., passing a
//! builder name where a revision is expected) and make the code more self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when a revision string is not in canonical short form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid revision {0:?}: expected {len} lowercase alphanumeric characters", len = Revision::SHORT_LEN)]
pub struct InvalidRevision(pub String);

/// A revision identifier in its canonical short form (12 characters).
///
/// Notifications carry full 40-character hashes; [`Revision::from_raw`] truncates
/// them so that every event for the same push keys the same registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Length of the canonical short form.
    pub const SHORT_LEN: usize = 12;

    /// Creates a revision without validation or truncation.
    pub fn new(s: impl Into<String>) -> Self {
        Revision(s.into())
    }

    /// Normalizes a raw revision string to the canonical short form.
    ///
    /// Truncation respects character boundaries, so arbitrary input never panics.
    pub fn from_raw(raw: &str) -> Self {
        let end = raw
            .char_indices()
            .nth(Self::SHORT_LEN)
            .map_or(raw.len(), |(idx, _)| idx);
        Revision(raw[..end].to_string())
    }

    /// Parses and validates a revision, truncating long hashes first.
    pub fn parse(raw: &str) -> Result<Self, InvalidRevision> {
        let rev = Self::from_raw(raw);
        if rev.is_well_formed() {
            Ok(rev)
        } else {
            Err(InvalidRevision(raw.to_string()))
        }
    }

    /// Returns true if this is exactly [`Self::SHORT_LEN`] characters of `[a-z0-9]`.
    ///
    /// Malformed revisions are never sent upstream.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::SHORT_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    }

    /// Returns the revision as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Revision(s.to_string())
    }
}

/// A CI queue (tree) name, e.g. `try`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Branch(String);

impl Branch {
    /// The developer pre-merge queue, the only branch the engine acts on.
    pub const TRY: &'static str = "try";

    pub fn new(s: impl Into<String>) -> Self {
        Branch(s.into())
    }

    /// Returns the `try` branch.
    pub fn try_queue() -> Self {
        Branch(Self::TRY.to_string())
    }

    pub fn is_try(&self) -> bool {
        self.0 == Self::TRY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Branch {
    fn from(s: &str) -> Self {
        Branch(s.to_string())
    }
}

/// The name of a build/test configuration, e.g.
/// `Ubuntu VM 12.04 x64 try opt test mochitest-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuilderName(String);

impl BuilderName {
    pub fn new(s: impl Into<String>) -> Self {
        BuilderName(s.into())
    }

    /// Returns true if this builder runs performance (talos) tests.
    ///
    /// Talos jobs have their own rebuild count in try syntax.
    pub fn is_talos(&self) -> bool {
        self.0.to_ascii_lowercase().contains("talos")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuilderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BuilderName {
    fn from(s: &str) -> Self {
        BuilderName(s.to_string())
    }
}

/// Identifier of a completed or running build in the upstream build API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub u64);

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a pending build request in the upstream build API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

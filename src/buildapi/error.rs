//! Build API error types.
//!
//! Errors are categorized for retry decisions:
//!
//! - **Transient** errors are retried with backoff inside the client (network
//!   failures, HTTP 5xx, HTTP 429)
//! - **Permanent** errors are returned immediately (other HTTP 4xx)
//! - **Malformed** responses arrived but could not be decoded. They are kept
//!   apart from "no matching records" so callers can log them as errors
//!   instead of scheduling a lookup retry.

use std::fmt;
use thiserror::Error;

/// The kind of build API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildApiErrorKind {
    /// Safe to retry with backoff.
    Transient,

    /// Retrying will not help (bad credentials, unknown branch, ...).
    Permanent,

    /// The response body was not the expected JSON.
    Malformed,
}

impl BuildApiErrorKind {
    pub fn is_retriable(&self) -> bool {
        matches!(self, BuildApiErrorKind::Transient)
    }
}

/// A categorized build API error.
#[derive(Debug, Error)]
pub struct BuildApiError {
    pub kind: BuildApiErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for BuildApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "build API error (HTTP {}): {}", code, self.message),
            None => write!(f, "build API error: {}", self.message),
        }
    }
}

impl BuildApiError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::without_source(BuildApiErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::without_source(BuildApiErrorKind::Permanent, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::without_source(BuildApiErrorKind::Malformed, message)
    }

    fn without_source(kind: BuildApiErrorKind, message: impl Into<String>) -> Self {
        BuildApiError {
            kind,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes a reqwest error.
    ///
    /// Decode failures are malformed responses. Errors carrying a status use
    /// the status; the rest are transport failures, which are transient when
    /// they look like timeouts or connection problems.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());

        let kind = if err.is_decode() {
            BuildApiErrorKind::Malformed
        } else {
            match status_code {
                Some(code) => kind_for_status(code),
                None if err.is_timeout() || err.is_connect() || err.is_request() => {
                    BuildApiErrorKind::Transient
                }
                None => BuildApiErrorKind::Permanent,
            }
        };

        BuildApiError {
            kind,
            status_code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Builds an error for a non-success HTTP status.
    pub fn from_status(code: u16, message: impl Into<String>) -> Self {
        BuildApiError {
            kind: kind_for_status(code),
            status_code: Some(code),
            message: message.into(),
            source: None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.kind == BuildApiErrorKind::Malformed
    }
}

fn kind_for_status(code: u16) -> BuildApiErrorKind {
    match code {
        429 => BuildApiErrorKind::Transient,
        500..=599 => BuildApiErrorKind::Transient,
        _ => BuildApiErrorKind::Permanent,
    }
}

//! Build bus notification payloads.
//!
//! A notification looks like:
//!
//! ```json
//! {
//!   "_meta": {"routing_key": "build.try-linux64-test-xpcshell.12.finished"},
//!   "payload": {
//!     "build": {
//!       "properties": [["revision", "0123456789abcdef...", "Build"], ...],
//!       "results": 1,
//!       "sourceStamp": {"changes": [{"comments": "try: -b o", "who": "dev@example.com"}]}
//!     }
//!   }
//! }
//! ```
//!
//! Extraction keeps only test jobs on the `try` branch that are not on
//! Windows, and normalizes them into [`BuildEvent`]s.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::types::{Branch, BuildEvent, BuildStatus, BuilderName, LifecyclePhase, Revision};

/// Platforms whose testers are never retriggered.
const EXCLUDED_PLATFORMS: &[&str] = &["win32", "win64"];

/// Error type for notification parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A build property the engine needs is absent.
    #[error("missing build property {0:?}")]
    MissingProperty(&'static str),

    /// The routing key pattern could not be built for this branch.
    #[error("invalid routing key pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

/// A raw build bus message.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(rename = "_meta")]
    pub meta: Meta,
    pub payload: Payload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub routing_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payload {
    pub build: BuildData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildData {
    /// `[name, value, source]` triples.
    #[serde(default)]
    pub properties: Vec<Vec<Value>>,
    #[serde(default)]
    pub results: Option<i64>,
    #[serde(default, rename = "sourceStamp")]
    pub source_stamp: Option<SourceStamp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceStamp {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub who: Option<String>,
}

impl Notification {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl BuildData {
    /// Returns the last string value recorded for a property.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|p| p.first().and_then(Value::as_str) == Some(name))
            .and_then(|p| p.get(1))
            .and_then(Value::as_str)
    }

    /// The newest change in the source stamp, which carries the push's message.
    fn last_change(&self) -> Option<&Change> {
        self.source_stamp.as_ref()?.changes.last()
    }
}

/// Matches test job routing keys on `branch`, capturing the lifecycle phase
/// as the last group.
fn test_job_pattern(branch: &str) -> Result<regex_lite::Regex, regex_lite::Error> {
    regex_lite::Regex::new(&format!(
        r"^build\.(({})[-|_](.*?)(-debug|-o-debug|-pgo|_pgo|_test)?[-|_](test|unittest|pgo)-(.*?))\.(\d+)\.(started|finished)",
        regex_lite::escape(branch)
    ))
}

/// Returns true if the routing key names a test job on `branch`.
pub fn is_test_job(routing_key: &str, branch: &str) -> Result<bool, ParseError> {
    Ok(test_job_pattern(branch)?.is_match(routing_key))
}

/// Normalizes a notification into an engine event.
///
/// Returns `Ok(None)` for everything the engine ignores: other branches,
/// non-test jobs, excluded platforms and unknown lifecycle phases.
pub fn extract_event(notification: &Notification) -> Result<Option<BuildEvent>, ParseError> {
    let key = notification.meta.routing_key.as_str();
    let build = &notification.payload.build;

    let Some(branch) = build.property("branch") else {
        debug!(key, "Notification has no branch, ignoring");
        return Ok(None);
    };
    if branch != Branch::TRY {
        return Ok(None);
    }
    if !is_test_job(key, branch)? {
        debug!(key, "Not a test job, ignoring");
        return Ok(None);
    }
    if build
        .property("platform")
        .is_some_and(|p| EXCLUDED_PLATFORMS.contains(&p))
    {
        debug!(key, "Platform excluded from triggering");
        return Ok(None);
    }
    let Some(phase) = LifecyclePhase::from_routing_key(key) else {
        return Ok(None);
    };

    let revision = build
        .property("revision")
        .ok_or(ParseError::MissingProperty("revision"))?;
    let builder = build
        .property("buildername")
        .ok_or(ParseError::MissingProperty("buildername"))?;

    let change = build.last_change();
    let comments = change
        .and_then(|c| c.comments.as_deref())
        .filter(|c| c.contains("try:"))
        .unwrap_or_default();
    let user = change.and_then(|c| c.who.clone());

    Ok(Some(BuildEvent {
        phase,
        branch: Branch::new(branch),
        revision: Revision::from_raw(revision),
        builder: BuilderName::new(builder),
        status: BuildStatus::from_code(build.results),
        comments: comments.to_string(),
        user,
    }))
}

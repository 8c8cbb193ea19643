//! State inspection endpoints for observability.
//!
//! Provides a read-only view of the engine for debugging and monitoring.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::AppState;
use crate::engine::EngineStats;
use crate::registry::RevisionEntry;
use crate::types::{Branch, InvalidRevision, Revision};

/// Errors that can occur when fetching state.
#[derive(Debug, Error)]
pub enum StateError {
    /// The revision is not tracked (never seen, or evicted).
    #[error("revision not tracked: {0}")]
    NotFound(Revision),

    #[error("{0}")]
    InvalidRevision(#[from] InvalidRevision),
}

impl IntoResponse for StateError {
    fn into_response(self) -> Response {
        let status = match &self {
            StateError::NotFound(_) => StatusCode::NOT_FOUND,
            StateError::InvalidRevision(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

/// Returns the try branch registry entry for a revision.
///
/// Full 40-character hashes are accepted and truncated.
///
/// # Example
///
/// ```ignore
/// GET /api/v1/revisions/0123456789ab HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {
///   "revision": "0123456789ab",
///   "branch": "try",
///   "policy": {"kind": "failure_retry_only", "count": 2},
///   "rev_trigger_count": 2,
///   ...
/// }
/// ```
pub async fn revision_handler(
    State(app_state): State<AppState>,
    Path(revision): Path<String>,
) -> Result<Json<RevisionEntry>, StateError> {
    let revision = Revision::parse(&revision)?;
    app_state
        .engine()
        .entry(&Branch::try_queue(), &revision)
        .await
        .map(Json)
        .ok_or(StateError::NotFound(revision))
}

/// Returns the engine's counters.
pub async fn stats_handler(State(app_state): State<AppState>) -> Json<EngineStats> {
    Json(app_state.engine().stats().await)
}

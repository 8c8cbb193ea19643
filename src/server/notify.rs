//! Notification intake endpoint.
//!
//! Accepts raw build notifications, checks the signature when a secret is
//! configured, and hands them to the event worker before returning
//! 202 Accepted. Processing happens asynchronously in the worker.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, warn};

use super::AppState;
use crate::notifications::{Notification, ParseError, SIGNATURE_HEADER, verify_signature};
use crate::worker::WorkerMessage;

/// Errors that can occur when accepting a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A secret is configured but the request is unsigned.
    #[error("missing required header: x-hub-signature-256")]
    MissingSignature,

    /// Invalid signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Body is not a notification.
    #[error("invalid notification: {0}")]
    InvalidPayload(#[from] ParseError),

    /// The worker has stopped and can no longer accept notifications.
    #[error("event worker unavailable")]
    WorkerUnavailable,
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        let status = match &self {
            NotifyError::MissingSignature | NotifyError::InvalidSignature => StatusCode::UNAUTHORIZED,
            NotifyError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            NotifyError::WorkerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// Notification handler.
///
/// # Response
///
/// - 202 Accepted: queued for the worker
/// - 400 Bad Request: body is not a notification
/// - 401 Unauthorized: missing or invalid signature
/// - 503 Service Unavailable: the worker has stopped
///
/// # Example
///
/// ```ignore
/// POST /notifications HTTP/1.1
/// X-Hub-Signature-256: sha256=...
/// Content-Type: application/json
///
/// {"_meta": {"routing_key": "build.try-linux64-test-xpcshell.4.finished"}, "payload": {...}}
///
/// HTTP/1.1 202 Accepted
/// ```
pub async fn notify_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), NotifyError> {
    // Verify the signature before parsing anything.
    if let Some(secret) = app_state.notify_secret() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(NotifyError::MissingSignature)?;
        if !verify_signature(&body, signature, secret) {
            warn!("Invalid notification signature");
            return Err(NotifyError::InvalidSignature);
        }
    }

    let notification = Notification::from_slice(&body)?;
    debug!(routing_key = %notification.meta.routing_key, "Received notification");

    app_state
        .sender()
        .send(WorkerMessage::Notification(Box::new(notification)))
        .await
        .map_err(|_| NotifyError::WorkerUnavailable)?;

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

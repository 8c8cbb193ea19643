//! HTTP server for the trigger bot.
//!
//! This module implements the HTTP server that:
//! - Accepts build notifications, validates signatures, and queues them for the worker
//! - Provides state inspection endpoints for observability
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /notifications` - Accepts build notifications (returns 202 Accepted)
//! - `GET /api/v1/revisions/{revision}` - Returns a revision's trigger state as JSON
//! - `GET /api/v1/stats` - Returns engine counters as JSON
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::TriggerEngine;
use crate::worker::WorkerMessage;

pub mod health;
pub mod notify;
pub mod state;

pub use health::health_handler;
pub use notify::{NotifyError, notify_handler};
pub use state::{StateError, revision_handler, stats_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Arc<TriggerEngine>,

    /// Sending half of the worker's channel.
    tx: mpsc::Sender<WorkerMessage>,

    /// Secret for verifying notification signatures. Unsigned requests are
    /// accepted when unset.
    notify_secret: Option<Vec<u8>>,
}

impl AppState {
    pub fn new(
        engine: Arc<TriggerEngine>,
        tx: mpsc::Sender<WorkerMessage>,
        notify_secret: Option<Vec<u8>>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                engine,
                tx,
                notify_secret,
            }),
        }
    }

    pub fn engine(&self) -> &Arc<TriggerEngine> {
        &self.inner.engine
    }

    pub fn sender(&self) -> &mpsc::Sender<WorkerMessage> {
        &self.inner.tx
    }

    pub fn notify_secret(&self) -> Option<&[u8]> {
        self.inner.notify_secret.as_deref()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/notifications", post(notify_handler))
        .route("/api/v1/revisions/{revision}", get(revision_handler))
        .route("/api/v1/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

//! The event loop feeding notifications through the engine.
//!
//! # Event Processing Flow
//!
//! 1. Receive a notification from the channel
//! 2. Extract a [`BuildEvent`], dropping notifications the engine ignores
//! 3. Load the hidden builders if they have never been loaded
//! 4. Let the engine decide which builders to trigger
//! 5. Cancel scheduled retries for revisions the engine just evicted
//! 6. Submit each decision to the trigger pool
//! 7. Every `hidden_refresh_interval` events, refresh the hidden builders
//!
//! A failure in any step is logged and the loop moves on to the next message.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::buildapi::{BuildLookup, BuilderVisibility, RebuildTrigger};
use crate::notifications::{Notification, ParseError, extract_event};
use crate::scheduler::TriggerPool;
use crate::types::BuildEvent;

use super::message::WorkerMessage;

/// Errors that can occur while handling one message.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Notification parsing failed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

/// Serially processes build notifications.
pub struct EventWorker<L, T, V> {
    pool: TriggerPool<L, T>,

    /// Source of hidden builders. Without one the hidden set never changes.
    visibility: Option<V>,
}

impl<L, T, V> EventWorker<L, T, V>
where
    L: BuildLookup + 'static,
    T: RebuildTrigger + 'static,
    V: BuilderVisibility,
{
    pub fn new(pool: TriggerPool<L, T>, visibility: Option<V>) -> Self {
        EventWorker { pool, visibility }
    }

    /// Runs the event loop until shutdown or until every sender is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<WorkerMessage>, shutdown: CancellationToken) {
        info!("Event worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping worker");
                    break;
                }

                msg = rx.recv() => {
                    match msg {
                        Some(WorkerMessage::Notification(notification)) => {
                            if let Err(e) = self.handle_notification(&notification).await {
                                error!(
                                    error = %e,
                                    routing_key = %notification.meta.routing_key,
                                    "Error handling notification"
                                );
                            }
                        }
                        Some(WorkerMessage::Shutdown) => {
                            info!("Shutdown message received");
                            break;
                        }
                        None => {
                            info!("Message channel closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("Event worker stopped");
    }

    /// Handles one notification, returning the handles of any trigger
    /// executions it started.
    pub async fn handle_notification(
        &self,
        notification: &Notification,
    ) -> Result<Vec<JoinHandle<()>>> {
        match extract_event(notification)? {
            Some(event) => Ok(self.handle_event(&event).await),
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self, event), fields(revision = %event.revision, builder = %event.builder))]
    pub async fn handle_event(&self, event: &BuildEvent) -> Vec<JoinHandle<()>> {
        debug!(phase = ?event.phase, status = ?event.status, user = ?event.user, "Saw build event");

        let engine = self.pool.engine();
        let initial_load = !engine.hidden_loaded();
        if initial_load {
            self.refresh_hidden(event).await;
        }

        let requests = engine.handle_event(event).await;

        for (branch, revision) in engine.take_evicted().await {
            let cancelled = self.pool.cancel_revision(&branch, &revision).await;
            if cancelled > 0 {
                info!(revision = %revision, cancelled, "Cancelled retries for evicted revision");
            }
        }

        if !initial_load && engine.refresh_due() {
            self.refresh_hidden(event).await;
        }

        requests
            .into_iter()
            .map(|request| self.pool.submit(request))
            .collect()
    }

    /// Replaces the engine's hidden builders. Keeps the previous set on failure.
    async fn refresh_hidden(&self, event: &BuildEvent) {
        let Some(visibility) = &self.visibility else {
            return;
        };

        match visibility
            .hidden_builders(&event.branch, &event.revision)
            .await
        {
            Ok(hidden) => self.pool.engine().replace_hidden(hidden).await,
            Err(e) => warn!(error = %e, "Could not refresh hidden builders, keeping the old set"),
        }
    }
}

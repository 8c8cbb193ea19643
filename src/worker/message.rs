//! Worker message types for async communication.

use crate::notifications::Notification;

/// Messages that can be sent to the event worker.
///
/// The worker receives these via `tokio::sync::mpsc` and processes them
/// serially, so events for a revision are handled in delivery order.
#[derive(Debug)]
pub enum WorkerMessage {
    /// A build notification to process.
    Notification(Box<Notification>),

    /// Request a graceful shutdown.
    ///
    /// The worker finishes the current notification and exits its loop.
    /// Trigger executions already submitted keep running.
    Shutdown,
}

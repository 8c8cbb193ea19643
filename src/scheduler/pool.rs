//! Bounded pool of trigger executions with cancellable delayed retries.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::executor::{TriggerExecutor, TriggerOutcome};
use super::retry::{RetryKey, RetrySchedule};
use crate::buildapi::{BuildLookup, RebuildTrigger};
use crate::engine::{TriggerEngine, TriggerRequest};
use crate::types::{Branch, Revision};

struct PoolInner<L, T> {
    executor: TriggerExecutor<L, T>,
    permits: Semaphore,
    schedule: RetrySchedule,
    /// Scheduled re-attempts, each with its own cancellation token.
    pending: Mutex<HashMap<RetryKey, CancellationToken>>,
    shutdown: CancellationToken,
}

/// Runs trigger requests off the event path.
///
/// At most `workers` executions talk to the build API at once. A request
/// whose builder has nothing recorded yet sleeps for the retry delay without
/// holding a permit, then runs again, until the schedule is exhausted.
/// Cancelling the shutdown token cancels every sleeping retry.
pub struct TriggerPool<L, T> {
    inner: Arc<PoolInner<L, T>>,
}

impl<L, T> Clone for TriggerPool<L, T> {
    fn clone(&self) -> Self {
        TriggerPool {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, T> TriggerPool<L, T>
where
    L: BuildLookup + 'static,
    T: RebuildTrigger + 'static,
{
    pub fn new(
        executor: TriggerExecutor<L, T>,
        schedule: RetrySchedule,
        workers: usize,
        shutdown: CancellationToken,
    ) -> Self {
        TriggerPool {
            inner: Arc::new(PoolInner {
                executor,
                permits: Semaphore::new(workers.max(1)),
                schedule,
                pending: Mutex::new(HashMap::new()),
                shutdown,
            }),
        }
    }

    pub fn engine(&self) -> &Arc<TriggerEngine> {
        self.inner.executor.engine()
    }

    /// Starts executing a request. The handle resolves once the request has
    /// been triggered, dropped, or given up on.
    pub fn submit(&self, request: TriggerRequest) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(request).await })
    }

    /// Number of re-attempts currently waiting for their delay.
    pub async fn pending_retries(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    /// Cancels every scheduled re-attempt for a revision. Returns how many
    /// were cancelled.
    pub async fn cancel_revision(&self, branch: &Branch, revision: &Revision) -> usize {
        let pending = self.inner.pending.lock().await;
        let mut cancelled = 0;
        for (key, token) in pending.iter() {
            if &key.branch == branch && &key.revision == revision {
                token.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}

impl<L: BuildLookup, T: RebuildTrigger> PoolInner<L, T> {
    #[instrument(skip_all, fields(revision = %request.revision, builder = %request.builder))]
    async fn run(&self, request: TriggerRequest) {
        let mut attempt = 0;
        loop {
            let result = {
                let Ok(_permit) = self.permits.acquire().await else {
                    return;
                };
                self.executor.execute(&request, attempt).await
            };

            match result {
                Ok(TriggerOutcome::RetryLater) => {}
                Ok(outcome) => {
                    debug!(?outcome, "Trigger request finished");
                    return;
                }
                Err(e) if e.is_malformed() => {
                    error!(error = %e, "Could not understand the build lookup, dropping trigger");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "Build API call failed, dropping trigger");
                    return;
                }
            }

            let Some(next) = self.schedule.next_attempt(attempt) else {
                warn!(
                    attempts = attempt + 1,
                    "Already tried to find something to rebuild, giving up"
                );
                return;
            };

            if !self.wait_for_retry(RetryKey::new(&request, next)).await {
                info!("Scheduled retry cancelled");
                return;
            }
            attempt = next;
        }
    }

    /// Sleeps for the retry delay. Returns false if cancelled first.
    async fn wait_for_retry(&self, key: RetryKey) -> bool {
        let token = self.shutdown.child_token();
        self.pending.lock().await.insert(key.clone(), token.clone());
        warn!(attempt = key.attempt, delay = ?self.schedule.delay, "Will re-attempt");

        let fired = tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(self.schedule.delay) => true,
        };

        self.pending.lock().await.remove(&key);
        fired
    }
}

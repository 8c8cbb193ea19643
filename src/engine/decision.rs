//! The retrigger decision engine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::quota::{AllowList, FailureAllowance, failure_allowance, within_tolerance};
use super::request::{TriggerOrigin, TriggerRequest};
use crate::config::EngineConfig;
use crate::registry::{RevisionEntry, RevisionRegistry};
use crate::types::{Branch, BuildEvent, BuilderName, LifecyclePhase, Revision};

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Runs the process has decided to trigger, including runs whose build
    /// API call was skipped for submitters outside the allow-list.
    pub global_triggers: u64,
    pub processed_events: u64,
    pub registry_size: usize,
    pub hidden_builders: usize,
}

/// Result of [`TriggerEngine::charge_failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCharge {
    Charged,
    OverTolerance { issued: u32 },
    Evicted,
}

/// Owns the revision registry and every counter the trigger rules consult.
///
/// All registry access goes through a single mutex. The event path and
/// deferred trigger executions both lock it; neither holds it across an
/// upstream call.
#[derive(Debug)]
pub struct TriggerEngine {
    config: EngineConfig,
    registry: Mutex<RevisionRegistry>,
    hidden: RwLock<HashSet<BuilderName>>,
    hidden_loaded: AtomicBool,
    allow_list: AllowList,
    global_triggers: AtomicU64,
    processed_events: AtomicU64,
}

impl TriggerEngine {
    pub fn new(config: EngineConfig, allow_list: AllowList) -> Self {
        TriggerEngine {
            registry: Mutex::new(RevisionRegistry::new(config.revmap_threshold)),
            config,
            hidden: RwLock::new(HashSet::new()),
            hidden_loaded: AtomicBool::new(false),
            allow_list,
            global_triggers: AtomicU64::new(0),
            processed_events: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Classifies one event and returns the triggers it warrants.
    ///
    /// 1. An unknown revision whose event carries comments is registered.
    /// 2. A started event runs the requested-trigger path.
    /// 3. A failed or excepted job runs the failure-trigger path.
    ///
    /// Each (revision, builder) pair produces at most one trigger over the
    /// lifetime of the revision's entry.
    #[instrument(skip(self, event), fields(revision = %event.revision, builder = %event.builder))]
    pub async fn handle_event(&self, event: &BuildEvent) -> Vec<TriggerRequest> {
        self.processed_events.fetch_add(1, Ordering::Relaxed);

        let hidden = event.status.is_failure() && self.is_hidden(&event.builder).await;
        let mut registry = self.registry.lock().await;
        let mut requests = Vec::new();

        if !registry.known_revision(&event.branch, &event.revision) && !event.comments.is_empty() {
            registry.register_revision(
                &event.branch,
                &event.revision,
                &event.comments,
                event.user.as_deref(),
                self.config.registration(),
            );
        }

        let Some(entry) = registry.get_mut(&event.branch, &event.revision) else {
            debug!("Event for an unregistered revision");
            return requests;
        };

        if event.phase == LifecyclePhase::Started {
            requests.extend(requested_trigger(entry, &event.builder));
        }

        if event.status.is_failure() {
            info!("Found a failure and may retrigger");
            if hidden {
                info!("Builder is hidden, not retriggering");
            } else {
                requests.extend(self.failure_trigger(entry, &event.builder));
            }
        }

        requests
    }

    fn failure_trigger(
        &self,
        entry: &mut RevisionEntry,
        builder: &BuilderName,
    ) -> Option<TriggerRequest> {
        let Some(count) = entry.policy.fail_retrigger() else {
            info!("Found no request to retrigger on failure");
            return None;
        };

        if !entry.mark_seen(builder) {
            info!("Already triggered this builder, not doing it again");
            return None;
        }

        if count == 0 {
            return None;
        }

        let issued = entry.rev_trigger_count;
        let origin = match failure_allowance(issued, self.config.lower_trigger_limit) {
            FailureAllowance::Granted => {
                entry.rev_trigger_count += count;
                warn!(count, already_triggered = issued, "Triggering failed builder");
                TriggerOrigin::Failure
            }
            FailureAllowance::NeedsTolerance { issued } => {
                info!(
                    issued,
                    limit = self.config.lower_trigger_limit,
                    "Failure budget exhausted, deferring to tolerance check"
                );
                TriggerOrigin::FailureOverLimit { issued }
            }
        };

        Some(TriggerRequest {
            branch: entry.branch.clone(),
            revision: entry.revision.clone(),
            builder: builder.clone(),
            count,
            origin,
        })
    }

    /// Applies the tolerance check to an over-limit failure trigger and, if it
    /// passes, charges the runs to the revision.
    ///
    /// Check and charge happen under one registry lock, so concurrent
    /// executions for the same revision see each other's charges.
    pub async fn charge_failure(
        &self,
        branch: &Branch,
        revision: &Revision,
        count: u32,
        rev_total: usize,
    ) -> FailureCharge {
        let mut registry = self.registry.lock().await;
        let Some(entry) = registry.get_mut(branch, revision) else {
            return FailureCharge::Evicted;
        };

        let issued = entry.rev_trigger_count;
        if !within_tolerance(issued, self.config.tolerance_factor, rev_total) {
            return FailureCharge::OverTolerance { issued };
        }
        entry.rev_trigger_count += count;
        FailureCharge::Charged
    }

    /// Returns the revisions removed by the most recent eviction, once.
    pub async fn take_evicted(&self) -> Vec<(Branch, Revision)> {
        self.registry.lock().await.take_evicted()
    }

    pub async fn is_known(&self, branch: &Branch, revision: &Revision) -> bool {
        self.registry.lock().await.known_revision(branch, revision)
    }

    /// Returns a snapshot of a revision's entry.
    pub async fn entry(&self, branch: &Branch, revision: &Revision) -> Option<RevisionEntry> {
        self.registry.lock().await.get(branch, revision).cloned()
    }

    /// Adds `count` to the process-wide trigger counter and returns the new total.
    pub fn record_triggers(&self, count: u32) -> u64 {
        self.global_triggers
            .fetch_add(u64::from(count), Ordering::Relaxed)
            + u64::from(count)
    }

    pub fn permits(&self, user: Option<&str>) -> bool {
        self.allow_list.permits(user)
    }

    pub async fn is_hidden(&self, builder: &BuilderName) -> bool {
        self.hidden.read().await.contains(builder)
    }

    /// Replaces the hidden-builder set.
    pub async fn replace_hidden(&self, hidden: HashSet<BuilderName>) {
        debug!(count = hidden.len(), "Refreshed hidden builders");
        *self.hidden.write().await = hidden;
        self.hidden_loaded.store(true, Ordering::Relaxed);
    }

    /// False until the hidden-builder set has been replaced at least once.
    pub fn hidden_loaded(&self) -> bool {
        self.hidden_loaded.load(Ordering::Relaxed)
    }

    /// Returns true when the number of processed events has just reached a
    /// multiple of the refresh interval.
    pub fn refresh_due(&self) -> bool {
        let interval = self.config.hidden_refresh_interval;
        let processed = self.processed_events.load(Ordering::Relaxed);
        interval > 0 && processed > 0 && processed % interval == 0
    }

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            global_triggers: self.global_triggers.load(Ordering::Relaxed),
            processed_events: self.processed_events.load(Ordering::Relaxed),
            registry_size: self.registry.lock().await.len(),
            hidden_builders: self.hidden.read().await.len(),
        }
    }
}

/// Requested triggers fire once per builder when the job starts, regardless
/// of its eventual outcome.
fn requested_trigger(entry: &mut RevisionEntry, builder: &BuilderName) -> Option<TriggerRequest> {
    let counts = entry.policy.requested()?;
    info!("Found a request to trigger and may retrigger");

    if !entry.mark_seen(builder) {
        info!("Already triggered this builder, not doing it again");
        return None;
    }

    let count = counts.for_builder(builder);
    if count == 0 {
        debug!("No rebuilds requested for this category of builder");
        return None;
    }

    info!(count, "May trigger requested jobs");
    Some(TriggerRequest {
        branch: entry.branch.clone(),
        revision: entry.revision.clone(),
        builder: builder.clone(),
        count,
        origin: TriggerOrigin::Requested,
    })
}

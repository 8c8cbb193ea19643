//! Resolves one trigger decision against the build API and carries it out.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::buildapi::{BuildApiError, BuildLookup, LookupSummary, RebuildTarget, RebuildTrigger};
use crate::engine::{FailureCharge, TriggerEngine, TriggerOrigin, TriggerRequest, within_tolerance};

/// What became of one execution of a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// The build API accepted the rebuild.
    Triggered { id: u64, endpoint: &'static str },

    /// Accounted, but the submitter is not on the allow-list.
    NotAllowed,

    /// The builder already has more runs than the request asks for.
    AlreadySatisfied { found: usize },

    /// The revision has used up its share of failure retriggers.
    OverTolerance { issued: u32, rev_total: usize },

    /// Nothing recorded for the builder yet. Try again later.
    RetryLater,

    /// The revision left the registry before the trigger ran.
    Evicted,

    /// The revision is not in canonical form and was never looked up.
    InvalidRevision,
}

impl TriggerOutcome {
    fn triggered(target: RebuildTarget) -> Self {
        TriggerOutcome::Triggered {
            id: target.id(),
            endpoint: target.endpoint(),
        }
    }
}

/// Executes [`TriggerRequest`]s for a [`TriggerEngine`].
///
/// Every execution re-reads the revision's entry first, so a request whose
/// revision has been evicted in the meantime does nothing.
#[derive(Debug)]
pub struct TriggerExecutor<L, T> {
    engine: Arc<TriggerEngine>,
    lookup: L,
    trigger: T,
}

impl<L: BuildLookup, T: RebuildTrigger> TriggerExecutor<L, T> {
    pub fn new(engine: Arc<TriggerEngine>, lookup: L, trigger: T) -> Self {
        TriggerExecutor {
            engine,
            lookup,
            trigger,
        }
    }

    pub fn engine(&self) -> &Arc<TriggerEngine> {
        &self.engine
    }

    /// Runs one attempt of a trigger request.
    ///
    /// Lookup and trigger failures are returned as errors; every other reason
    /// not to trigger is an `Ok` outcome.
    #[instrument(
        skip(self, request),
        fields(revision = %request.revision, builder = %request.builder, count = request.count)
    )]
    pub async fn execute(
        &self,
        request: &TriggerRequest,
        attempt: u32,
    ) -> Result<TriggerOutcome, BuildApiError> {
        if !request.revision.is_well_formed() {
            error!("Revision doesn't look valid, can't trigger it");
            return Ok(TriggerOutcome::InvalidRevision);
        }

        let Some(entry) = self.engine.entry(&request.branch, &request.revision).await else {
            info!("Revision is no longer tracked, dropping trigger");
            return Ok(TriggerOutcome::Evicted);
        };

        if !self.engine.permits(entry.user.as_deref()) {
            let total = self.engine.record_triggers(request.count);
            warn!(
                user = entry.user.as_deref().unwrap_or("<unknown>"),
                total,
                "Would have triggered, but the submitter is not a trigger bot user"
            );
            return Ok(TriggerOutcome::NotAllowed);
        }

        debug!(attempt, "Looking up builds to rebuild");
        let records = self.lookup.lookup(&request.branch, &request.revision).await?;
        let summary = LookupSummary::summarize(&records, &request.builder);

        if summary.builder_total > request.count as usize {
            warn!(
                found = summary.builder_total,
                "Already found more runs than requested for this builder, not triggering"
            );
            return Ok(TriggerOutcome::AlreadySatisfied {
                found: summary.builder_total,
            });
        }

        let over_limit = matches!(request.origin, TriggerOrigin::FailureOverLimit { .. });
        // Trigger counts only grow, so failing against the snapshot means the
        // request would fail the charge below as well.
        if over_limit {
            let issued = entry.rev_trigger_count;
            let tolerance = self.engine.config().tolerance_factor;
            if !within_tolerance(issued, tolerance, summary.rev_total) {
                return Ok(over_tolerance(issued, summary.rev_total));
            }
        }

        let Some(target) = summary.target() else {
            warn!(attempt, "No builds found with that builder name to rebuild");
            info!(?records, "All builds found");
            return Ok(TriggerOutcome::RetryLater);
        };

        if over_limit {
            let charge = self
                .engine
                .charge_failure(&request.branch, &request.revision, request.count, summary.rev_total)
                .await;
            match charge {
                FailureCharge::Charged => {}
                FailureCharge::OverTolerance { issued } => {
                    return Ok(over_tolerance(issued, summary.rev_total));
                }
                FailureCharge::Evicted => {
                    info!("Revision was evicted during lookup, dropping trigger");
                    return Ok(TriggerOutcome::Evicted);
                }
            }
        }

        let total = self.engine.record_triggers(request.count);
        warn!(total, "Total triggers performed by this service so far");

        self.trigger
            .trigger(&request.branch, target, request.count)
            .await?;
        Ok(TriggerOutcome::triggered(target))
    }
}

fn over_tolerance(issued: u32, rev_total: usize) -> TriggerOutcome {
    warn!(
        issued,
        rev_total,
        "Would have triggered, but there are already too many failures"
    );
    TriggerOutcome::OverTolerance { issued, rev_total }
}

//! Shared test fixtures: event builders and in-memory collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use crate::buildapi::{
    BuildApiError, BuildLookup, BuildRecord, BuilderVisibility, BuilderVisibilityRecord,
    RebuildTarget, RebuildTrigger,
};
use crate::types::{Branch, BuildEvent, BuildStatus, BuilderName, LifecyclePhase, Revision};

/// A plain try directive: no rebuild request, retries enabled.
pub const PLAIN_TRY: &str = "try: -b o -p linux -u xpcshell -t none";

/// The `n`th test revision, in canonical short form.
pub fn rev(n: u32) -> Revision {
    Revision::new(format!("{:012x}", n))
}

/// A started event carrying a submission message.
pub fn started(revision: &Revision, builder: &str, comments: &str) -> BuildEvent {
    BuildEvent {
        phase: LifecyclePhase::Started,
        branch: Branch::try_queue(),
        revision: revision.clone(),
        builder: BuilderName::from(builder),
        status: BuildStatus::Pending,
        comments: comments.to_string(),
        user: Some("dev@example.com".to_string()),
    }
}

/// A finished event with the given result code and no submission message.
pub fn finished(revision: &Revision, builder: &str, code: i64) -> BuildEvent {
    BuildEvent {
        phase: LifecyclePhase::Finished,
        branch: Branch::try_queue(),
        revision: revision.clone(),
        builder: BuilderName::from(builder),
        status: BuildStatus::from_code(Some(code)),
        comments: String::new(),
        user: Some("dev@example.com".to_string()),
    }
}

pub fn arb_revision() -> impl Strategy<Value = Revision> {
    "[0-9a-z]{12}".prop_map(Revision::new)
}

pub fn arb_builder() -> impl Strategy<Value = BuilderName> {
    prop_oneof![
        "[a-z0-9 ]{1,20} test [a-z0-9-]{1,10}".prop_map(BuilderName::new),
        "[a-z0-9 ]{1,20} talos [a-z0-9-]{1,10}".prop_map(BuilderName::new),
    ]
}

// ─── Mock build API ───────────────────────────────────────────────────────────

/// How the mock answers lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    /// Return the configured records.
    Records,
    /// Fail as if the response could not be decoded.
    Malformed,
}

#[derive(Debug)]
struct MockBuildApiInner {
    records: Mutex<HashMap<(Branch, Revision), Vec<BuildRecord>>>,
    triggers: Mutex<Vec<(Branch, RebuildTarget, u32)>>,
    lookups: AtomicU32,
    mode: Mutex<LookupMode>,
}

/// In-memory build API. Clones share state.
#[derive(Debug, Clone)]
pub struct MockBuildApi {
    inner: Arc<MockBuildApiInner>,
}

impl Default for MockBuildApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBuildApi {
    pub fn new() -> Self {
        MockBuildApi {
            inner: Arc::new(MockBuildApiInner {
                records: Mutex::new(HashMap::new()),
                triggers: Mutex::new(Vec::new()),
                lookups: AtomicU32::new(0),
                mode: Mutex::new(LookupMode::Records),
            }),
        }
    }

    /// Replaces the records for a revision on the try branch.
    pub fn set_records(&self, revision: &Revision, records: Vec<BuildRecord>) {
        self.inner
            .records
            .lock()
            .unwrap()
            .insert((Branch::try_queue(), revision.clone()), records);
    }

    /// Gives each builder one finished build, plus `filler` records for
    /// unrelated builders so the revision has a realistic job total.
    pub fn seed(&self, revision: &Revision, builders: &[&str], filler: usize) {
        let mut records: Vec<_> = builders
            .iter()
            .enumerate()
            .map(|(i, b)| BuildRecord::build(*b, 1000 + i as u64))
            .collect();
        records.extend((0..filler).map(|i| BuildRecord::build(format!("filler-{}", i), i as u64)));
        self.set_records(revision, records);
    }

    pub fn set_mode(&self, mode: LookupMode) {
        *self.inner.mode.lock().unwrap() = mode;
    }

    pub fn lookups(&self) -> u32 {
        self.inner.lookups.load(Ordering::SeqCst)
    }

    pub fn triggers(&self) -> Vec<(Branch, RebuildTarget, u32)> {
        self.inner.triggers.lock().unwrap().clone()
    }

    /// Total runs triggered for a target id.
    pub fn triggered_for(&self, id: u64) -> u32 {
        self.triggers()
            .iter()
            .filter(|(_, target, _)| target.id() == id)
            .map(|(_, _, count)| count)
            .sum()
    }

    pub fn total_triggered(&self) -> u32 {
        self.triggers().iter().map(|(_, _, count)| count).sum()
    }
}

impl BuildLookup for MockBuildApi {
    async fn lookup(
        &self,
        branch: &Branch,
        revision: &Revision,
    ) -> Result<Vec<BuildRecord>, BuildApiError> {
        self.inner.lookups.fetch_add(1, Ordering::SeqCst);
        if *self.inner.mode.lock().unwrap() == LookupMode::Malformed {
            return Err(BuildApiError::malformed("expected a JSON list"));
        }
        Ok(self
            .inner
            .records
            .lock()
            .unwrap()
            .get(&(branch.clone(), revision.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

impl RebuildTrigger for MockBuildApi {
    async fn trigger(
        &self,
        branch: &Branch,
        target: RebuildTarget,
        count: u32,
    ) -> Result<(), BuildApiError> {
        self.inner
            .triggers
            .lock()
            .unwrap()
            .push((branch.clone(), target, count));
        Ok(())
    }
}

// ─── Mock visibility ──────────────────────────────────────────────────────────

/// In-memory visibility service. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockVisibility {
    hidden: Arc<Mutex<HashSet<BuilderName>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicU32>,
}

impl MockVisibility {
    /// Hides exactly these builders.
    pub fn hide(&self, builders: &[&str]) {
        *self.hidden.lock().unwrap() = builders.iter().map(|b| BuilderName::from(*b)).collect();
    }

    /// Makes every subsequent call fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BuilderVisibility for MockVisibility {
    async fn builders(
        &self,
        _branch: &Branch,
        _revision: &Revision,
    ) -> Result<Vec<BuilderVisibilityRecord>, BuildApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(BuildApiError::transient("visibility service unavailable"));
        }
        let hidden = self.hidden.lock().unwrap().clone();
        Ok(hidden
            .into_iter()
            .map(|buildername| BuilderVisibilityRecord {
                buildername,
                hidden: true,
            })
            .collect())
    }
}

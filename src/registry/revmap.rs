//! Bounded map of revisions to their trigger state.
//!
//! # Eviction
//!
//! Entries are never deleted individually. An entry only needs to live from the
//! first notification for its push until its last job finishes, but pending jobs
//! can take a long time to finish, so the registry keeps a generous number of
//! revisions. Once it grows past `threshold` entries, the oldest entries (by
//! `time_seen`) are removed until two thirds of the threshold remain, and
//! never fewer than one.
//!
//! With a few hundred pushes a day and a threshold in the low thousands, sorting
//! on each eviction is cheap.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::entry::{RevisionEntry, TriggerPolicy};
use crate::try_syntax::parse_try_syntax;
use crate::types::{Branch, Revision};

/// Settings that shape newly registered entries.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationConfig {
    /// Failure retries granted to revisions without an explicit request.
    pub default_retry: u32,
    /// Ceiling for each requested rebuild count.
    pub requested_limit: u32,
}

/// The revision registry.
#[derive(Debug)]
pub struct RevisionRegistry {
    entries: HashMap<(Branch, Revision), RevisionEntry>,
    threshold: usize,
    next_seq: u64,
    last_evicted: Vec<(Branch, Revision)>,
}

impl RevisionRegistry {
    /// Creates an empty registry that evicts once it exceeds `threshold` entries.
    ///
    /// A threshold of zero is treated as one.
    pub fn new(threshold: usize) -> Self {
        RevisionRegistry {
            entries: HashMap::new(),
            threshold: threshold.max(1),
            next_seq: 0,
            last_evicted: Vec::new(),
        }
    }

    /// Returns true if the revision has an entry.
    pub fn known_revision(&self, branch: &Branch, revision: &Revision) -> bool {
        self.entries
            .contains_key(&(branch.clone(), revision.clone()))
    }

    pub fn get(&self, branch: &Branch, revision: &Revision) -> Option<&RevisionEntry> {
        self.entries.get(&(branch.clone(), revision.clone()))
    }

    pub fn get_mut(&mut self, branch: &Branch, revision: &Revision) -> Option<&mut RevisionEntry> {
        self.entries.get_mut(&(branch.clone(), revision.clone()))
    }

    /// Number of registered revisions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The size eviction reduces the registry to.
    pub fn target_size(&self) -> usize {
        (self.threshold * 2 / 3).max(1)
    }

    /// Registers a revision the first time a notification with comments arrives.
    ///
    /// Parses the try directive, decides the revision's [`TriggerPolicy`], and
    /// evicts old entries if the registry has grown past its threshold. Returns
    /// the chosen policy.
    pub fn register_revision(
        &mut self,
        branch: &Branch,
        revision: &Revision,
        comments: &str,
        user: Option<&str>,
        config: RegistrationConfig,
    ) -> TriggerPolicy {
        self.register_revision_at(branch, revision, comments, user, config, Utc::now())
    }

    /// Like [`Self::register_revision`], with an explicit registration time.
    pub fn register_revision_at(
        &mut self,
        branch: &Branch,
        revision: &Revision,
        comments: &str,
        user: Option<&str>,
        config: RegistrationConfig,
        now: DateTime<Utc>,
    ) -> TriggerPolicy {
        let request = parse_try_syntax(comments, config.requested_limit);
        let policy = TriggerPolicy::from_request(&request, config.default_retry);

        match policy {
            TriggerPolicy::RequestedOnly { counts } => info!(
                revision = %revision,
                rebuild = counts.test,
                rebuild_talos = counts.talos,
                "Added requested triggers"
            ),
            TriggerPolicy::FailureRetryOnly { count } => {
                info!(revision = %revision, count, "Adding default failure retries")
            }
            TriggerPolicy::None => info!(revision = %revision, "Retries disabled by submitter"),
        }

        let entry = RevisionEntry {
            revision: revision.clone(),
            branch: branch.clone(),
            policy,
            rev_trigger_count: 0,
            seen_builders: BTreeSet::new(),
            user: user.map(str::to_string),
            time_seen: now,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries
            .insert((branch.clone(), revision.clone()), entry);

        if self.entries.len() > self.threshold {
            self.evict_oldest();
        }

        policy
    }

    /// Removes the oldest entries until [`Self::target_size`] remain.
    ///
    /// Returns the number of entries removed. The removed keys are kept until
    /// the next eviction or [`Self::take_evicted`].
    pub fn evict_oldest(&mut self) -> usize {
        let target = self.target_size();
        let excess = self.entries.len().saturating_sub(target);
        if excess == 0 {
            return 0;
        }
        info!(count = excess, "Pruning entries from the revision registry");

        let mut by_age: Vec<_> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.time_seen, entry.seq, key.clone()))
            .collect();
        by_age.sort_unstable();

        self.last_evicted.clear();
        for (_, _, key) in by_age.iter().take(excess) {
            self.entries.remove(key);
            self.last_evicted.push(key.clone());
        }

        if let Some((_, _, (_, oldest))) = by_age.get(excess) {
            debug!(oldest = %oldest, "Finished pruning");
        }
        excess
    }

    /// Takes the keys removed by the most recent eviction.
    pub fn take_evicted(&mut self) -> Vec<(Branch, Revision)> {
        std::mem::take(&mut self.last_evicted)
    }

    /// Iterates over all entries in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = &RevisionEntry> {
        self.entries.values()
    }
}

//! Process-wide order state, keyed by resource family
//!
//! One [`OrderState`] lives for the process lifetime and tracks, per
//! family: the cached tail position used as the neutral creation slot,
//! the intents not yet confirmed complete, and the in-flight marker the
//! sequencer uses to serialize reorder walks.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::backend::RulePosition;
use crate::error::Result;

/// Lowest privilege level; the backend's default for rules created
/// without an explicit rank.
pub const DEFAULT_RANK: u8 = 7;

/// A caller's desired placement for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderIntent {
    /// Backend rule identifier
    pub id: i64,

    /// Intended 1-based position within the family's list
    pub order: i64,

    /// Intended privilege level, 0–7
    pub rank: u8,
}

/// Mutable per-family bookkeeping. Always accessed under the family's
/// lock.
#[derive(Debug, Default)]
pub(crate) struct FamilyCore {
    /// Cached tail position; 0 means not yet initialized
    pub starting_order: i64,

    /// Intents recorded but not yet confirmed complete
    pub pending: HashMap<i64, OrderIntent>,

    /// Whether a reorder walk is currently executing for this family
    pub in_flight: bool,
}

/// One family's lock and done-signal handshake. Entries are created on
/// first touch and never removed outside [`OrderState::reset`].
#[derive(Debug, Default)]
pub(crate) struct FamilyEntry {
    pub core: Mutex<FamilyCore>,
    pub walk_done: Condvar,
}

/// Thread-safe storage for all families' order state.
///
/// The outer map lock is held only long enough to get-or-create an
/// entry; everything else happens under the family's own lock, so
/// families never block each other on backend calls.
#[derive(Debug, Default)]
pub struct OrderState {
    families: Mutex<HashMap<String, Arc<FamilyEntry>>>,
}

/// A poisoned lock means another thread panicked mid-update; the state
/// kept here (a cached integer, a pending map, a flag) stays coherent
/// regardless, so recover the guard instead of propagating the panic.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl OrderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or lazily create the entry for `family`.
    pub(crate) fn family(&self, family: &str) -> Arc<FamilyEntry> {
        let mut families = lock_unpoisoned(&self.families);
        Arc::clone(families.entry(family.to_string()).or_default())
    }

    /// Return the family's starting (tail) order, computing it on first
    /// call from the supplied enumeration: `max(observed order) + 1`,
    /// or 1 for an empty family.
    ///
    /// The whole check-compute-store sequence runs under the family
    /// lock, so two racing callers cannot both enumerate. The value is
    /// cached for the process lifetime and never recomputed even if the
    /// backend's true tail changes through some other path — a
    /// deliberate tradeoff that saves an enumeration per create; the
    /// subsequent reorder walk corrects any staleness.
    ///
    /// # Errors
    ///
    /// Propagates the enumeration error; `starting_order` stays 0 so
    /// the next caller retries initialization cleanly.
    pub fn get_or_init_starting_order<F>(&self, family: &str, enumerate: F) -> Result<i64>
    where
        F: FnOnce() -> Result<Vec<RulePosition>>,
    {
        let entry = self.family(family);
        let mut core = lock_unpoisoned(&entry.core);

        if core.starting_order == 0 {
            let rules = enumerate()?;
            let max_order = rules.iter().map(|r| r.order).max().unwrap_or(0);
            core.starting_order = max_order + 1;
            tracing::debug!(
                family,
                starting_order = core.starting_order,
                rules = rules.len(),
                "Initialized starting order"
            );
        }

        Ok(core.starting_order)
    }

    /// Record an intent as pending. Idempotent: re-recording the same
    /// rule replaces its intent.
    pub fn record_pending(&self, family: &str, intent: OrderIntent) {
        let entry = self.family(family);
        let mut core = lock_unpoisoned(&entry.core);
        core.pending.insert(intent.id, intent);
    }

    /// Remove a rule's pending intent. Idempotent.
    pub fn clear_pending(&self, family: &str, id: i64) {
        let entry = self.family(family);
        let mut core = lock_unpoisoned(&entry.core);
        core.pending.remove(&id);
    }

    /// Confirm a rule's reorder complete, removing it from `pending`.
    pub fn mark_done(&self, family: &str, id: i64) {
        tracing::debug!(family, id, "Rule order confirmed");
        self.clear_pending(family, id);
    }

    /// Snapshot of the family's pending intents, sorted by rule id.
    pub fn pending(&self, family: &str) -> Vec<OrderIntent> {
        let entry = self.family(family);
        let core = lock_unpoisoned(&entry.core);
        let mut intents: Vec<OrderIntent> = core.pending.values().copied().collect();
        intents.sort_by_key(|i| i.id);
        intents
    }

    /// The cached starting order, or 0 if not yet initialized.
    pub fn cached_starting_order(&self, family: &str) -> i64 {
        let entry = self.family(family);
        lock_unpoisoned(&entry.core).starting_order
    }

    /// Drop all family state: cached starting orders, pending intents,
    /// in-flight markers and their done signals.
    ///
    /// Test-only escape hatch for a clean slate between test cases.
    /// Production code never calls it; calling it while operations are
    /// in flight forfeits the one-walk-per-family guarantee.
    pub fn reset(&self) {
        let mut families = lock_unpoisoned(&self.families);
        for entry in families.values() {
            let mut core = lock_unpoisoned(&entry.core);
            core.in_flight = false;
            core.pending.clear();
            core.starting_order = 0;
            entry.walk_done.notify_all();
        }
        families.clear();
    }
}

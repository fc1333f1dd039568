//! Per-family serialization of reorder walks
//!
//! The backend list has no compare-and-swap: two concurrent walks would
//! each compute moves against a stale snapshot and corrupt the final
//! order. So at most one walk executes per family at any instant;
//! walks for different families proceed independently.

use std::sync::Arc;

use crate::state::{FamilyEntry, OrderState, lock_unpoisoned};

/// Exclusive right to run a reorder walk for one family.
///
/// Dropping the slot clears the family's in-flight marker and wakes any
/// waiter — the release half of the acquire/release pairing happens on
/// every exit path, error returns and panics included.
#[must_use = "dropping the slot immediately releases the family"]
pub struct FamilySlot {
    family: String,
    entry: Arc<FamilyEntry>,
}

impl OrderState {
    /// Block until no reorder walk is in flight for `family`, then
    /// claim the slot.
    ///
    /// This is plain mutual exclusion, not a fair queue: when several
    /// callers wait on the same family, wakeup order is whatever the
    /// condition variable delivers. Callers must not assume arrival
    /// order is preserved.
    pub fn acquire_slot(&self, family: &str) -> FamilySlot {
        let entry = self.family(family);
        {
            let mut core = lock_unpoisoned(&entry.core);
            while core.in_flight {
                core = entry
                    .walk_done
                    .wait(core)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            }
            core.in_flight = true;
        }
        tracing::debug!(family, "Acquired reorder slot");
        FamilySlot {
            family: family.to_string(),
            entry,
        }
    }
}

impl Drop for FamilySlot {
    fn drop(&mut self) {
        let mut core = lock_unpoisoned(&self.entry.core);
        core.in_flight = false;
        self.entry.walk_done.notify_all();
        tracing::debug!(family = %self.family, "Released reorder slot");
    }
}

//! The coordinator facade
//!
//! One `OrderCoordinator` is constructed per process and passed by
//! reference to every resource Create/Update handler — an explicit
//! injected instance rather than a package global, so it can be unit
//! tested and swapped out. It owns the shared [`OrderState`] and the
//! retry policy; the backend operations arrive per call through the
//! [`RuleBackend`] seam.

use crate::backend::RuleBackend;
use crate::error::{Error, Result};
use crate::mover::Mover;
use crate::planner;
use crate::report::ReorderReport;
use crate::retry::{Deadline, RetryPolicy, with_retry};
use crate::state::{OrderIntent, OrderState};

/// Process-wide coordinator for rule-order reconciliation.
pub struct OrderCoordinator {
    state: OrderState,
    policy: RetryPolicy,
}

impl Default for OrderCoordinator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl OrderCoordinator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: OrderState::new(),
            policy,
        }
    }

    /// Shared order state, for diagnostics and tests.
    pub fn state(&self) -> &OrderState {
        &self.state
    }

    /// The neutral position a new rule should be created at: the
    /// family's cached tail. Never the caller's intended position —
    /// creating there directly would race with any other in-flight
    /// create or move for the same family.
    ///
    /// # Errors
    ///
    /// Propagates the enumeration failure once retries are exhausted;
    /// the cache stays uninitialized so a later call retries cleanly.
    pub fn creation_order(&self, family: &str, backend: &dyn RuleBackend) -> Result<i64> {
        let deadline = Deadline::new(self.policy.budget);
        self.state.get_or_init_starting_order(family, || {
            with_retry(&self.policy, &deadline, || backend.enumerate())
        })
    }

    /// Walk one rule from wherever it currently sits to its intended
    /// order, honoring rank constraints.
    ///
    /// The intent is recorded as pending, the family's serialization
    /// slot is held for the duration of the walk (released on every
    /// exit path), and the pending entry is cleared on every terminal
    /// outcome — confirmed complete on success, abandoned on failure.
    ///
    /// Blocks while another walk is in flight for the same family;
    /// walks for different families proceed concurrently. Waiting
    /// callers are not served in arrival order.
    ///
    /// # Errors
    ///
    /// See [`Error`]: structural rank conflicts fail fast with a
    /// diagnostic table, transient backend contention is retried until
    /// the policy budget lapses, and a move whose read-back never
    /// matches the intent is reported failed with the backend left as
    /// it settled.
    pub fn reorder(
        &self,
        family: &str,
        intent: OrderIntent,
        backend: &dyn RuleBackend,
    ) -> Result<ReorderReport> {
        if intent.rank > 7 {
            return Err(Error::InvalidRank { rank: intent.rank });
        }

        self.state.record_pending(family, intent);
        let result = self.run_walk(family, intent, backend);
        match &result {
            Ok(_) => self.state.mark_done(family, intent.id),
            Err(err) => {
                tracing::warn!(family, id = intent.id, %err, "Reorder abandoned");
                self.state.clear_pending(family, intent.id);
            }
        }
        result
    }

    fn run_walk(
        &self,
        family: &str,
        intent: OrderIntent,
        backend: &dyn RuleBackend,
    ) -> Result<ReorderReport> {
        let _slot = self.state.acquire_slot(family);
        let deadline = Deadline::new(self.policy.budget);

        let rules = with_retry(&self.policy, &deadline, || backend.enumerate())?;
        let target = planner::plan_move(family, intent, &rules)?;

        let mover = Mover::new(backend, &self.policy);
        let outcome = mover.relocate(family, intent.id, target, intent.rank, &deadline)?;

        let mut report = ReorderReport {
            family: family.to_string(),
            id: intent.id,
            final_order: outcome.final_order,
            attempts: outcome.attempts,
            actions: Vec::new(),
        };
        if let Some(requested) = outcome.requested {
            report = report.with_action(format!(
                "clamped target {requested} to {}",
                outcome.final_order
            ));
        }
        report = report.with_action(format!(
            "verified rule {} at order {}",
            intent.id, outcome.final_order
        ));
        Ok(report)
    }

    /// Snapshot of the family's pending intents.
    pub fn pending(&self, family: &str) -> Vec<OrderIntent> {
        self.state.pending(family)
    }

    /// Clear all family state. Test-only; see [`OrderState::reset`].
    pub fn reset(&self) {
        self.state.reset();
    }
}

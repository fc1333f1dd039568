//! Relocation walk for one rule
//!
//! The backend reflows every other rule's order as a side effect of one
//! rule's update, so a move is a single retried `set_order` call
//! followed by read-back verification — not a sequence of pairwise
//! swaps. The retry envelope stays deliberately wide: the backend has
//! been observed to reject mid-settle mutations with its generic
//! invalid-input class.

use std::thread;

use crate::backend::RuleBackend;
use crate::error::{Error, Result};
use crate::planner;
use crate::report::ConflictReport;
use crate::retry::{Deadline, RetryPolicy, with_retry};

/// What a completed walk did, for the coordinator's report.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReorderOutcome {
    /// Order the rule was verified at
    pub final_order: i64,

    /// Backend mutation attempts the walk needed
    pub attempts: u32,

    /// The requested target, when it had to be clamped to the live list
    pub requested: Option<i64>,
}

pub(crate) struct Mover<'a> {
    backend: &'a dyn RuleBackend,
    policy: &'a RetryPolicy,
}

impl<'a> Mover<'a> {
    pub fn new(backend: &'a dyn RuleBackend, policy: &'a RetryPolicy) -> Self {
        Self { backend, policy }
    }

    /// Relocate `id` to `target`, then verify the backend settled it
    /// there.
    ///
    /// The target is clamped into `[1, live count]` first — the plan
    /// was computed against a snapshot and the list may have shrunk or
    /// grown since. On failure the rule is left wherever the backend
    /// settled it; re-running the operation re-converges from current
    /// state.
    pub fn relocate(&self, family: &str, id: i64, target: i64, rank: u8, deadline: &Deadline) -> Result<ReorderOutcome> {
        let rules = with_retry(self.policy, deadline, || self.backend.enumerate())?;
        let count = (rules.len() as i64).max(1);
        let clamped = target.clamp(1, count);
        if clamped != target {
            tracing::debug!(family, id, target, clamped, "Clamped target to live list");
        }

        let mut attempts = 0u32;
        let mutation = with_retry(self.policy, deadline, || {
            attempts += 1;
            self.backend.set_order(id, clamped, rank)
        });
        match mutation {
            Ok(()) => {}
            Err(Error::Backend(err)) if err.is_rank_conflict() => {
                // The pre-flight plan missed this one; surface the same
                // diagnostic the planner would have produced. Best
                // effort: an empty table beats masking the conflict.
                let rows = self.backend.enumerate().unwrap_or_default();
                let (from, to) = planner::legal_window(rank, &rows, Some(id));
                return Err(Error::RankConflict {
                    family: family.to_string(),
                    order: clamped,
                    rank,
                    report: ConflictReport::new(family, rank, from, to, rows),
                });
            }
            Err(err) => return Err(err),
        }

        self.verify(family, id, clamped, deadline)?;

        tracing::debug!(family, id, order = clamped, attempts, "Rule relocated");
        Ok(ReorderOutcome {
            final_order: clamped,
            attempts,
            requested: (clamped != target).then_some(target),
        })
    }

    /// Re-read the rule until its settled order matches `wanted` or the
    /// deadline lapses.
    fn verify(&self, family: &str, id: i64, wanted: i64, deadline: &Deadline) -> Result<()> {
        let mut observed = 0;
        loop {
            let position = with_retry(self.policy, deadline, || self.backend.read_position(id))?;
            match position {
                Some(p) if p.order == wanted => return Ok(()),
                Some(p) => observed = p.order,
                None => {
                    return Err(Error::RuleNotFound {
                        family: family.to_string(),
                        id,
                    });
                }
            }

            if deadline.expired() {
                return Err(Error::VerificationFailed {
                    family: family.to_string(),
                    id,
                    wanted,
                    observed,
                });
            }
            tracing::debug!(family, id, wanted, observed, "Order not settled, re-reading");
            thread::sleep(self.policy.interval);
        }
    }
}

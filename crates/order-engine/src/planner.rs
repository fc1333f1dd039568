//! Placement planning for rule creation and moves
//!
//! Creation always targets the family's cached tail position (see
//! [`crate::state::OrderState::get_or_init_starting_order`]) — creating
//! directly at the caller's intended position would race with any other
//! in-flight create or move for the same family. Moves are validated
//! here against the rank constraint before a single backend call is
//! issued.

use crate::backend::RulePosition;
use crate::error::{Error, Result};
use crate::report::ConflictReport;
use crate::state::OrderIntent;

/// The orders a rule of `rank` may legally occupy among `current`
/// rules, as an inclusive `(from, to)` range of final positions.
///
/// A rule must sit after every rule of strictly lower rank value
/// (higher privilege) and before every rule of strictly higher rank
/// value. Rank-7 rules end up in a tail sub-sequence that never
/// interleaves with explicitly ranked rules. `exclude_id` removes the
/// rule being moved from the counts so it does not constrain itself.
pub fn legal_window(rank: u8, current: &[RulePosition], exclude_id: Option<i64>) -> (i64, i64) {
    let mut more_privileged = 0i64;
    let mut less_privileged = 0i64;
    let mut others = 0i64;

    for rule in current {
        if exclude_id == Some(rule.id) {
            continue;
        }
        others += 1;
        if rule.rank < rank {
            more_privileged += 1;
        } else if rule.rank > rank {
            less_privileged += 1;
        }
    }

    // Final list length once the planned rule is in place.
    let len_after = others + 1;
    (1 + more_privileged, len_after - less_privileged)
}

/// Validate the intended placement against the rank ordering of
/// `current` rules and return the target order for the walk.
///
/// Orders beyond the ends of the list are folded back into range first
/// (an over-long order means "tail", not a conflict); only a target
/// that would put `intent.rank` ahead of a more privileged rule, or
/// behind a less privileged one, is rejected. Rejection happens
/// pre-flight with a [`ConflictReport`] — no backend mutation is issued
/// for a placement the backend would refuse anyway.
///
/// # Errors
///
/// - [`Error::InvalidRank`] if the rank is outside 0–7.
/// - [`Error::RankConflict`] if no shift of other rules can make the
///   placement legal.
pub fn plan_move(family: &str, intent: OrderIntent, current: &[RulePosition]) -> Result<i64> {
    if intent.rank > 7 {
        return Err(Error::InvalidRank { rank: intent.rank });
    }

    let (from, to) = legal_window(intent.rank, current, Some(intent.id));
    let len_after = current
        .iter()
        .filter(|r| r.id != intent.id)
        .count() as i64
        + 1;
    let target = intent.order.clamp(1, len_after);

    if target < from || target > to {
        tracing::warn!(
            family,
            id = intent.id,
            order = intent.order,
            rank = intent.rank,
            legal_from = from,
            legal_to = to,
            "Placement conflicts with rank ordering"
        );
        return Err(Error::RankConflict {
            family: family.to_string(),
            order: intent.order,
            rank: intent.rank,
            report: ConflictReport::new(family, intent.rank, from, to, current.to_vec()),
        });
    }

    Ok(target)
}

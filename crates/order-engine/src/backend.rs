//! Backend seam for rule list operations

use serde::Serialize;

use crate::error::BackendError;

/// One rule's observed place on the backend's ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RulePosition {
    /// Backend rule identifier
    pub id: i64,

    /// 1-based absolute position within the family's list
    pub order: i64,

    /// Admin privilege level, 0–7, lower = higher privilege
    pub rank: u8,
}

/// Trait for the per-family backend operations the coordinator needs.
///
/// Implementations wrap the family's REST calls: list all rules, set
/// one rule's order field, and the resource's own Read path. One
/// implementation is supplied per resource family by the calling
/// Create/Update handler; the coordinator never talks to the network
/// itself.
///
/// The backend is assumed to reflow every other rule's order value as a
/// side effect of setting one rule's order — a move is a single
/// mutation, not a sequence of pairwise swaps.
pub trait RuleBackend: Send + Sync {
    /// List the family's rules with their current order and rank.
    ///
    /// Used to compute the starting (tail) order, the live count, and
    /// the rows of a conflict report.
    fn enumerate(&self) -> Result<Vec<RulePosition>, BackendError>;

    /// Set one rule's order (and rank — the upstream PUT replaces the
    /// whole rule body, so both travel together).
    fn set_order(&self, id: i64, order: i64, rank: u8) -> Result<(), BackendError>;

    /// Read one rule's settled position, or `None` if it no longer
    /// exists. This is the resource's own Read path, used to verify a
    /// move landed where intended.
    fn read_position(&self, id: i64) -> Result<Option<RulePosition>, BackendError>;
}

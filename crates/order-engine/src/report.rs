//! Diagnostic reports for reorder operations

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::RulePosition;

/// The legal envelope a rejected placement violated, together with the
/// family's current (order, rank) table.
///
/// Attached to rank-conflict errors so the caller can see at a glance
/// which positions their rank may occupy, instead of reverse-engineering
/// it from backend rejections one apply at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    /// Resource family the conflict occurred in
    pub family: String,

    /// Rank whose placement was rejected
    pub rank: u8,

    /// First order position the rank may legally occupy
    pub legal_from: i64,

    /// Last order position the rank may legally occupy
    pub legal_to: i64,

    /// Current rules, sorted by order
    pub rows: Vec<RulePosition>,
}

impl ConflictReport {
    pub fn new(
        family: impl Into<String>,
        rank: u8,
        legal_from: i64,
        legal_to: i64,
        mut rows: Vec<RulePosition>,
    ) -> Self {
        rows.sort_by_key(|r| r.order);
        Self {
            family: family.into(),
            rank,
            legal_from,
            legal_to,
            rows,
        }
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "legal orders for rank {}: {}..={}",
            self.rank, self.legal_from, self.legal_to
        )?;
        writeln!(f, "  {:>5}  {:>4}  id", "order", "rank")?;
        for row in &self.rows {
            writeln!(f, "  {:>5}  {:>4}  {}", row.order, row.rank, row.id)?;
        }
        Ok(())
    }
}

/// Report from a completed reorder operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderReport {
    /// Resource family the rule belongs to
    pub family: String,

    /// Rule that was relocated
    pub id: i64,

    /// Order the rule was verified at
    pub final_order: i64,

    /// Backend mutation attempts the walk needed
    pub attempts: u32,

    /// Actions taken during the operation
    pub actions: Vec<String>,
}

impl ReorderReport {
    /// Add an action to the report
    pub fn with_action(mut self, action: String) -> Self {
        self.actions.push(action);
        self
    }
}

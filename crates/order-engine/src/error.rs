//! Error types for order-engine

use std::time::Duration;

use crate::report::ConflictReport;

/// Result type for order-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error message fragments the backend emits while another concurrent
/// mutation is still settling. Matched case-insensitively; operations
/// failing with one of these are retried until the budget lapses.
const TRANSIENT_SIGNATURES: &[&str] = &["invalid_input_argument", "edit_lock_not_available"];

/// Error message fragments for the backend's explicit rank rejection.
/// These are caller-fixable and never retried.
const RANK_SIGNATURES: &[&str] = &["not allowed at this order", "admin rank"];

/// Failure reported by a caller-supplied backend operation.
///
/// The upstream API surfaces contention and rank rejections only as
/// message text, so classification is substring matching over the
/// message — there is no structured error code to switch on.
#[derive(Debug, Clone, thiserror::Error)]
#[error("backend request failed: {message}")]
pub struct BackendError {
    /// Raw message from the backend response
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the backend's generic contention
    /// class (another mutation settling). These are worth retrying.
    pub fn is_transient_conflict(&self) -> bool {
        let message = self.message.to_lowercase();
        TRANSIENT_SIGNATURES.iter().any(|s| message.contains(s))
    }

    /// Whether this error is the backend's explicit "rank not allowed
    /// at this order" rejection. Retrying cannot fix these.
    pub fn is_rank_conflict(&self) -> bool {
        let message = self.message.to_lowercase();
        RANK_SIGNATURES.iter().any(|s| message.contains(s))
    }
}

/// Errors that can occur in order-engine operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Non-retriable backend failure, including enumeration failures
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Requested placement is incompatible with the rank ordering of
    /// existing rules. Fails fast; the report lists the family's
    /// current (order, rank) pairs and the legal window.
    #[error("rank {rank} cannot occupy order {order} in {family}:\n{report}")]
    RankConflict {
        family: String,
        order: i64,
        rank: u8,
        report: ConflictReport,
    },

    /// Rank outside the 0–7 privilege domain
    #[error("rank {rank} is outside the allowed range 0-7")]
    InvalidRank { rank: u8 },

    /// A transient backend error survived the whole retry budget
    #[error("gave up after {attempts} attempts over {elapsed:?}: {source}")]
    RetriesExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: BackendError,
    },

    /// Post-move verification could not find the rule at all
    #[error("rule {id} not found in {family}")]
    RuleNotFound { family: String, id: i64 },

    /// The rule settled at a different order than intended and the
    /// deadline lapsed. The backend is left as it settled; re-running
    /// the operation re-converges from current state.
    #[error("rule {id} in {family} settled at order {observed}, wanted {wanted}")]
    VerificationFailed {
        family: String,
        id: i64,
        wanted: i64,
        observed: i64,
    },
}

//! Bounded retry around backend calls
//!
//! The backend reports contention (another mutation still settling) the
//! same way it reports genuine bad input, so every backend call in the
//! create/reorder path runs under a fixed-interval retry loop bounded
//! by one wall-clock budget per operation. The interval and budget
//! mirror the host driver's own resource timeout envelope.

use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;

use crate::error::{BackendError, Error, Result};

/// Retry interval and overall budget for one coordinator operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Sleep between attempts on a transient conflict
    pub interval: Duration,

    /// Wall-clock budget shared by every stage of one operation
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            budget: Duration::from_secs(60 * 60),
        }
    }
}

/// One operation's wall-clock budget. All stages of a reorder
/// (enumerate, mutate, verify) draw from the same deadline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Fixed-interval policy: multiplier 1.0 and no randomization, so the
/// attempt cadence is `budget / interval` within one.
fn fixed_interval(interval: Duration, remaining: Duration) -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: interval,
        max_interval: interval,
        multiplier: 1.0,
        randomization_factor: 0.0,
        max_elapsed_time: Some(remaining),
        ..ExponentialBackoff::default()
    }
}

/// Run `op`, retrying transient-conflict failures on the policy's
/// interval until the deadline's remaining budget lapses. Any other
/// failure is permanent and returns immediately.
pub(crate) fn with_retry<T, F>(policy: &RetryPolicy, deadline: &Deadline, mut op: F) -> Result<T>
where
    F: FnMut() -> std::result::Result<T, BackendError>,
{
    let mut attempts = 0u32;
    let result = backoff::retry(fixed_interval(policy.interval, deadline.remaining()), || {
        attempts += 1;
        op().map_err(|err| {
            if err.is_transient_conflict() {
                tracing::debug!(attempt = attempts, %err, "Transient backend conflict");
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            }
        })
    });

    match result {
        Ok(value) => Ok(value),
        Err(backoff::Error::Permanent(err)) => Err(Error::Backend(err)),
        Err(backoff::Error::Transient { err, .. }) => {
            tracing::warn!(attempts, elapsed = ?deadline.elapsed(), %err, "Retry budget exhausted");
            Err(Error::RetriesExhausted {
                attempts,
                elapsed: deadline.elapsed(),
                source: err,
            })
        }
    }
}

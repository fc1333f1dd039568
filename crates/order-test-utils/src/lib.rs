//! Shared test utilities for the rule-order coordinator workspace.
//!
//! This crate provides standardised test fixtures to eliminate
//! duplication across crate test suites. It is a dev-dependency only —
//! never published.
//!
//! The centrepiece is [`FakeBackend`]: an in-memory stand-in for one
//! family's rule list that mimics the remote API's behavior — setting
//! one rule's order reflows every other rule's order as a side effect —
//! plus scriptable failures and a concurrency gauge for the mutual
//! exclusion tests.

mod backend;

pub use backend::{FakeBackend, WalkGauge};

/// Initialise tracing for a test binary. Safe to call from every test;
/// only the first call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

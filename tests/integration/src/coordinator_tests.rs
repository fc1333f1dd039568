//! End-to-end coordinator scenarios against the fake backend
//!
//! These drive the full Create/Update path a resource handler would:
//! ask for the neutral creation slot, create there, then walk the rule
//! to its intended order.

use std::time::Duration;

use order_engine::{Error, OrderCoordinator, OrderIntent, RetryPolicy};
use order_test_utils::{FakeBackend, init_test_logging};
use pretty_assertions::assert_eq;

fn coordinator() -> OrderCoordinator {
    OrderCoordinator::new(RetryPolicy {
        interval: Duration::from_millis(20),
        budget: Duration::from_millis(200),
    })
}

fn intent(id: i64, order: i64, rank: u8) -> OrderIntent {
    OrderIntent { id, order, rank }
}

#[test]
fn test_create_then_reorder_flow() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(10, 7), (11, 7)]);

    // Create at the neutral tail slot, never at the intended position.
    let slot = coordinator.creation_order("fw", &backend).unwrap();
    assert_eq!(slot, 3);
    backend.create(12, slot, 7);

    // Walk the new rule to its intended order.
    let report = coordinator
        .reorder("fw", intent(12, 1, 7), &backend)
        .unwrap();

    assert_eq!(report.final_order, 1);
    assert_eq!(backend.orders(), vec![12, 10, 11]);
    assert!(coordinator.pending("fw").is_empty());
    assert_eq!(
        report.actions,
        vec!["verified rule 12 at order 1".to_string()]
    );
}

#[test]
fn test_concurrent_creates_share_the_cached_tail() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(10, 7)]);

    // The tail is computed once per family per process; a second create
    // sees the same slot even though the first create grew the list.
    assert_eq!(coordinator.creation_order("fw", &backend).unwrap(), 2);
    backend.create(11, 2, 7);
    assert_eq!(coordinator.creation_order("fw", &backend).unwrap(), 2);
    assert_eq!(backend.enumerate_calls(), 1);
}

#[test]
fn test_rank_conflict_reports_the_current_table() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 1), (2, 7)]);

    let err = coordinator
        .reorder("fw", intent(2, 1, 7), &backend)
        .unwrap_err();

    let text = err.to_string();
    assert!(text.contains("rank 7 cannot occupy order 1"), "{text}");
    assert!(text.contains("legal orders for rank 7: 2..=2"), "{text}");
    // Fails fast, pre-flight: the backend saw no mutation.
    assert_eq!(backend.set_order_calls(), 0);
}

#[test]
fn test_transient_contention_is_retried_within_budget() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 7), (2, 7)]);
    backend.script_set_order_failure("INVALID_INPUT_ARGUMENT");

    let report = coordinator
        .reorder("fw", intent(2, 1, 7), &backend)
        .unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(backend.orders(), vec![2, 1]);
}

#[test]
fn test_retry_attempts_are_bounded_by_the_budget() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 7), (2, 7)]);
    backend.fail_set_order_always("INVALID_INPUT_ARGUMENT");

    let err = coordinator
        .reorder("fw", intent(2, 1, 7), &backend)
        .unwrap_err();

    match err {
        Error::RetriesExhausted { attempts, .. } => {
            // budget / interval attempts, within scheduling slack —
            // and crucially never an unbounded loop.
            assert!(
                (2..=8).contains(&attempts),
                "expected bounded attempts, got {attempts}"
            );
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert!(coordinator.pending("fw").is_empty());
}

#[test]
fn test_creation_order_survives_transient_enumeration_failure() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 7)]);
    backend.script_enumerate_failure("EDIT_LOCK_NOT_AVAILABLE");

    let slot = coordinator.creation_order("fw", &backend).unwrap();
    assert_eq!(slot, 2);
    assert_eq!(backend.enumerate_calls(), 2);
}

#[test]
fn test_failed_enumeration_does_not_poison_the_cache() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 7)]);
    backend.script_enumerate_failure("permission denied");

    // Non-transient failure propagates immediately.
    assert!(coordinator.creation_order("fw", &backend).is_err());
    assert_eq!(coordinator.state().cached_starting_order("fw"), 0);

    // The next caller re-initializes cleanly.
    assert_eq!(coordinator.creation_order("fw", &backend).unwrap(), 2);
}

#[test]
fn test_verification_failure_releases_the_family() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 7), (2, 7), (3, 7)]);
    backend.settle_askew_at(3);

    let err = coordinator
        .reorder("fw", intent(1, 2, 7), &backend)
        .unwrap_err();
    assert!(matches!(err, Error::VerificationFailed { .. }));
    assert!(coordinator.pending("fw").is_empty());

    // The failure did not wedge the family's serialization slot.
    coordinator
        .reorder("fw", intent(1, 2, 7), &backend)
        .unwrap();
    assert_eq!(backend.orders(), vec![2, 1, 3]);
}

#[test]
fn test_reset_gives_a_clean_slate() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 7), (2, 7), (3, 7), (4, 7)]);

    assert_eq!(coordinator.creation_order("fw", &backend).unwrap(), 5);
    coordinator
        .state()
        .record_pending("fw", intent(3, 1, 7));
    coordinator
        .state()
        .record_pending("fw", intent(4, 2, 7));
    assert_eq!(coordinator.pending("fw").len(), 2);

    coordinator.reset();

    assert_eq!(coordinator.state().cached_starting_order("fw"), 0);
    assert!(coordinator.pending("fw").is_empty());

    // Re-initialization queries the backend exactly once more.
    assert_eq!(coordinator.creation_order("fw", &backend).unwrap(), 5);
    assert_eq!(backend.enumerate_calls(), 2);
}

#[test]
fn test_reorder_report_serializes() {
    init_test_logging();
    let coordinator = coordinator();
    let backend = FakeBackend::with_rules(&[(1, 7), (2, 7)]);

    let report = coordinator
        .reorder("fw", intent(2, 1, 7), &backend)
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["family"], "fw");
    assert_eq!(json["final_order"], 1);
}

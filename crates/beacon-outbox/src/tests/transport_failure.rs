//! Transport failure handling.
//!
//! - A failed batch is restored to the front, unchanged
//! - Consecutive failures back off timer ticks; success resets
//! - Events are dropped once they exhaust their delivery attempts
//! - A panicking send counts as a failure and releases the flush gate

use super::harness::{elapse, settle, test_config, SendResponse, TestHarness};
use crate::{FlushTrigger, Properties};

#[tokio::test(start_paused = true)]
async fn failed_send_then_success_delivers_identical_payload() {
    let h = TestHarness::new(test_config(10, 5_000));
    h.transport.queue_response(SendResponse::Reject(503));

    h.track(1);
    elapse(6_000).await;
    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(h.tracker.queue_size(), 1);

    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.tracker.queue_size(), 0);

    let calls = h.transport.calls();
    assert_eq!(calls[0], calls[1]);
}

#[tokio::test(start_paused = true)]
async fn failure_restores_same_events_in_same_order() {
    let h = TestHarness::new(test_config(5, 5_000));
    h.transport.queue_response(SendResponse::Reject(500));

    let ids = h.track(5);
    assert_eq!(h.tracker.queue_size(), 0);

    settle().await;
    assert_eq!(h.tracker.pending_event_ids(), ids);

    let status = h.tracker.status();
    assert_eq!(status.stats.failed_attempts, 1);
    assert_eq!(status.consecutive_failures, 1);
    assert!(!status.in_flight);
}

#[tokio::test(start_paused = true)]
async fn failures_never_reach_the_caller() {
    let h = TestHarness::new(test_config(2, 5_000));
    h.transport.set_default_response(SendResponse::Reject(502));

    for _ in 0..10 {
        let id = h.tracker.track_event("click", Properties::new());
        assert!(!id.is_empty());
        settle().await;
    }

    assert!(h.transport.call_count() >= 1);
    assert_eq!(h.tracker.status().stats.tracked, 10);
    assert_eq!(h.tracker.queue_size(), 10);
}

#[tokio::test(start_paused = true)]
async fn consecutive_failures_back_off_timer_ticks() {
    let h = TestHarness::new(test_config(10, 5_000));
    for _ in 0..3 {
        h.transport.queue_response(SendResponse::Reject(503));
    }

    h.track(1);

    // t=5000: first failure, retry on the very next tick
    elapse(5_100).await;
    assert_eq!(h.transport.call_count(), 1);

    // t=10000: second failure, skip one tick
    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 2);

    // t=15000: skipped
    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 2);

    // t=20000: third failure, skip three ticks
    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 3);
    assert_eq!(h.tracker.status().consecutive_failures, 3);

    // t=25000..35000: skipped
    elapse(15_000).await;
    assert_eq!(h.transport.call_count(), 3);

    // t=40000: succeeds and resets
    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 4);
    assert_eq!(h.tracker.queue_size(), 0);
    assert_eq!(h.tracker.status().consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn size_trigger_waits_out_backoff_but_explicit_flush_does_not() {
    let h = TestHarness::new(test_config(3, 5_000));
    h.transport.queue_response(SendResponse::Reject(503));
    h.transport.queue_response(SendResponse::Reject(503));

    h.track(1);
    elapse(5_100).await;
    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 2);

    h.track(2);
    settle().await;
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.tracker.queue_size(), 3);

    assert!(h.tracker.flush().started());
    settle().await;
    assert_eq!(h.transport.call_count(), 3);
    assert_eq!(h.tracker.queue_size(), 0);
}

#[tokio::test(start_paused = true)]
async fn events_dropped_after_max_delivery_attempts() {
    let mut config = test_config(10, 5_000);
    config.max_delivery_attempts = 2;
    let h = TestHarness::new(config);
    h.transport.set_default_response(SendResponse::Reject(500));

    h.track(1);
    elapse(5_100).await;
    assert_eq!(h.tracker.queue_size(), 1);

    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.tracker.queue_size(), 0);
    assert_eq!(h.tracker.status().stats.dropped_exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn only_exhausted_events_are_dropped_from_a_mixed_batch() {
    let mut config = test_config(2, 5_000);
    config.max_delivery_attempts = 2;
    let h = TestHarness::new(config);
    h.transport.set_default_response(SendResponse::Reject(500));

    let old = h.track(1);
    elapse(5_100).await;
    assert_eq!(h.tracker.pending_event_ids(), old);

    // Size trigger sends [old, new]; old hits its second failure
    let new = h.track(1);
    settle().await;
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.transport.call_ids(1), [old, new.clone()].concat());

    assert_eq!(h.tracker.pending_event_ids(), new);
    assert_eq!(h.tracker.status().stats.dropped_exhausted, 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_flush_reports_backing_off_only_for_size_and_timer() {
    let h = TestHarness::new(test_config(10, 5_000));
    h.transport.set_default_response(SendResponse::Reject(500));

    h.track(1);
    elapse(5_100).await;
    elapse(5_000).await;
    assert_eq!(h.tracker.status().consecutive_failures, 2);

    // Explicit flushes are never refused for backoff
    let trigger = h.tracker.flush();
    assert!(matches!(trigger, FlushTrigger::Started { events: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn panicking_send_is_a_failure_and_releases_the_gate() {
    let h = TestHarness::new(test_config(2, 5_000));
    h.transport.queue_response(SendResponse::Panic);

    let ids = h.track(2);
    settle().await;
    assert_eq!(h.transport.call_count(), 1);

    let status = h.tracker.status();
    assert!(!status.in_flight);
    assert_eq!(status.consecutive_failures, 1);
    assert_eq!(status.stats.failed_attempts, 1);
    assert_eq!(h.tracker.pending_event_ids(), ids);

    // A later size trigger is admitted and resends the restored batch
    let late = h.track(1);
    settle().await;
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(h.transport.call_ids(1), ids);

    assert!(h.tracker.flush().started());
    settle().await;
    assert_eq!(h.tracker.queue_size(), 0);

    let mut expected = ids;
    expected.extend(late);
    assert_eq!(h.transport.delivered_ids()[2..], expected[..]);
}

//! Ordering and trigger tests.
//!
//! - Ids are unique and each track grows the queue by one
//! - Reaching the batch size sends exactly one full batch, in append order
//! - The timer flushes partial batches
//! - Retried batches go ahead of events queued meanwhile

use super::harness::{elapse, settle, test_config, SendResponse, TestHarness};
use crate::EVENT_ID_PREFIX;
use beacon_config_and_utils::ids::is_valid_id;
use std::collections::HashSet;

#[tokio::test(start_paused = true)]
async fn track_returns_unique_ids_and_grows_queue_by_one() {
    let h = TestHarness::new(test_config(100, 5_000));

    let mut seen = HashSet::new();
    for expected_len in 1..=25 {
        let ids = h.track(1);
        assert!(is_valid_id(&ids[0], EVENT_ID_PREFIX), "bad id {}", ids[0]);
        assert!(seen.insert(ids[0].clone()), "duplicate id {}", ids[0]);
        assert_eq!(h.tracker.queue_size(), expected_len);
    }
}

#[tokio::test(start_paused = true)]
async fn batch_size_triggers_one_send_in_append_order() {
    let h = TestHarness::new(test_config(10, 5_000));

    let ids = h.track(10);
    settle().await;

    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(h.transport.call_ids(0), ids);
}

#[tokio::test(start_paused = true)]
async fn ten_events_leave_queue_immediately() {
    let h = TestHarness::new(test_config(10, 5_000));

    h.track(9);
    assert_eq!(h.tracker.queue_size(), 9);

    h.track(1);
    // Drained synchronously by the 10th call, before any await
    assert_eq!(h.tracker.queue_size(), 0);

    settle().await;
    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(h.transport.calls()[0].len(), 10);
}

#[tokio::test(start_paused = true)]
async fn partial_batch_waits_for_timer() {
    let h = TestHarness::new(test_config(10, 5_000));

    let ids = h.track(3);
    elapse(4_900).await;
    assert_eq!(h.tracker.queue_size(), 3);
    assert_eq!(h.transport.call_count(), 0);

    elapse(1_100).await;
    assert_eq!(h.tracker.queue_size(), 0);
    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(h.transport.call_ids(0), ids);
}

#[tokio::test(start_paused = true)]
async fn empty_timer_ticks_send_nothing() {
    let h = TestHarness::new(test_config(10, 5_000));

    elapse(30_000).await;
    assert_eq!(h.transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn oversized_backlog_goes_out_in_batch_sized_chunks() {
    let mut config = test_config(4, 5_000);
    config.offline_mode = true;
    let h = TestHarness::new(config);

    let ids = h.track(10);
    assert_eq!(h.tracker.queue_size(), 10);

    h.tracker.set_online(true);
    settle().await;

    // Successful sends keep draining full batches; the remainder waits
    let calls = h.transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.len() == 4));
    assert_eq!(h.tracker.queue_size(), 2);

    elapse(5_000).await;
    assert_eq!(h.transport.call_count(), 3);
    assert_eq!(h.transport.delivered_ids(), ids);
}

#[tokio::test(start_paused = true)]
async fn retried_batch_goes_ahead_of_newer_events() {
    let h = TestHarness::new(test_config(3, 5_000));
    h.transport.queue_response(SendResponse::Reject(500));

    let first = h.track(3);
    settle().await;
    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(h.tracker.queue_size(), 3);

    // The first new event re-triggers the size check, which retries the
    // failed batch; the rest queue behind it
    let newer = h.track(2);
    settle().await;
    assert_eq!(h.transport.call_count(), 2);

    let mut expected = first.clone();
    expected.extend(newer.clone());
    assert_eq!(h.transport.call_ids(1), first);
    assert_eq!(h.tracker.pending_event_ids(), newer);

    elapse(5_000).await;
    let delivered: Vec<String> = h.transport.calls()[1..]
        .iter()
        .flatten()
        .map(|e| e.id().to_string())
        .collect();
    assert_eq!(delivered, expected);
}

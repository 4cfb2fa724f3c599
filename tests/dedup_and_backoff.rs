//! P3 (dedup), P4 (backoff respected), E4 (ten-failure dead-letter series).

mod common;

use nutrilog_store::test_support::FailureMode;

#[tokio::test]
async fn repeated_saves_collapse_into_one_queue_row() {
    let fx = common::build(common::fast_config());
    let mut entry = common::food_entry("f1", "u1", 1_700_000_000);

    for calories in [70.0, 71.0, 72.0, 73.0] {
        entry.calories = calories;
        fx.store.save_food_log(&entry).unwrap();
    }

    let ready = fx.store.queue().ready_operations().unwrap();
    assert_eq!(ready.len(), 1);

    let latest: nutrilog_store::db::collections::FoodLogEntry =
        serde_json::from_slice(ready[0].data.as_ref().unwrap()).unwrap();
    assert_eq!(latest.calories, 73.0);
}

#[tokio::test]
async fn saving_a_matching_food_entry_under_a_new_id_folds_into_the_existing_row() {
    let fx = common::build(common::fast_config());
    let first = common::food_entry("f1", "u1", 1_700_000_000);
    fx.store.save_food_log(&first).unwrap();

    let mut duplicate = common::food_entry("f2", "u1", 1_700_000_000);
    duplicate.calories = 999.0;
    let applied = fx.store.save_food_log(&duplicate).unwrap();
    assert!(applied);

    // The second save collapsed into the first row, not a new one.
    assert!(fx.store.get_food_log("f2").unwrap().is_none());
    let existing = fx.store.get_food_log("f1").unwrap().unwrap();
    assert_eq!(existing.calories, 999.0);
}

#[tokio::test]
async fn ready_operations_never_returns_a_row_still_backing_off() {
    let fx = common::build(common::fast_config());
    fx.remote.set_failure_mode(FailureMode::AlwaysFail);

    let entry = common::food_entry("f1", "u1", 1_700_000_000);
    fx.store.save_food_log(&entry).unwrap();

    fx.engine.force_sync().await.unwrap();
    // The op failed and is now backing off; it must not be ready yet.
    assert!(fx.store.queue().ready_operations().unwrap().is_empty());

    fx.clock.advance(1); // first backoff is 2s
    assert!(fx.store.queue().ready_operations().unwrap().is_empty());

    fx.clock.advance(2);
    assert_eq!(fx.store.queue().ready_operations().unwrap().len(), 1);
}

#[tokio::test]
async fn ten_consecutive_failures_dead_letter_with_capped_backoff_series() {
    let fx = common::build(common::fast_config());
    fx.remote.set_failure_mode(FailureMode::AlwaysFail);

    let entry = common::food_entry("r1", "u1", 1_700_000_000);
    fx.store.save_food_log(&entry).unwrap();

    let expected_backoff = [2i64, 4, 8, 16, 32, 64, 128, 256, 300, 300];

    for (attempt, &backoff) in expected_backoff.iter().enumerate() {
        fx.engine.force_sync().await.unwrap();
        if attempt < expected_backoff.len() - 1 {
            let ready = fx.store.queue().ready_operations().unwrap();
            assert_eq!(ready.len(), 0, "op should be backing off after attempt {attempt}");
            fx.clock.advance(backoff);
        }
    }

    // The 11th failure (attempt index 9, retry_count reaches max_retry=10)
    // dead-letters the op and removes it from the active queue.
    fx.engine.force_sync().await.unwrap();

    assert!(fx.store.queue().ready_operations().unwrap().is_empty());
    let failed = fx.store.queue().list_failed().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].document_id, "r1");
}

#[tokio::test]
async fn retry_failed_moves_a_dead_letter_back_into_the_active_queue() {
    let fx = common::build(common::fast_config());
    fx.remote.set_failure_mode(FailureMode::AlwaysFail);

    let entry = common::food_entry("r1", "u1", 1_700_000_000);
    fx.store.save_food_log(&entry).unwrap();

    let expected_backoff = [2i64, 4, 8, 16, 32, 64, 128, 256, 300, 300];
    for &backoff in &expected_backoff {
        fx.engine.force_sync().await.unwrap();
        fx.clock.advance(backoff);
    }
    fx.engine.force_sync().await.unwrap();

    let failed = fx.store.queue().list_failed().unwrap();
    assert_eq!(failed.len(), 1);

    // User asks to retry a dead-lettered op: it reappears in sync_queue
    // with a fresh id and reset retry state, and is gone from failed_operations.
    fx.store.queue().retry_failed(&failed[0].id).unwrap();
    assert!(fx.store.queue().list_failed().unwrap().is_empty());

    let ready = fx.store.queue().ready_operations().unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].document_id, "r1");
    assert_eq!(ready[0].retry_count, 0);
    assert_ne!(ready[0].id, failed[0].id);

    // And it can now succeed once the remote recovers.
    fx.remote.set_failure_mode(FailureMode::None);
    let report = fx.engine.force_sync().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(fx.store.get_food_log("r1").unwrap().is_some());
}

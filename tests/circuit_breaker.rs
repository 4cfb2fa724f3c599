//! P6: a persistent failure storm trips the circuit breaker and stops
//! hammering the remote, instead of retrying every op on every drain.

mod common;

use nutrilog_store::test_support::FailureMode;

#[tokio::test]
async fn a_failing_batch_trips_the_breaker_and_later_drains_are_skipped() {
    let fx = common::build(common::fast_config());
    fx.remote.set_failure_mode(FailureMode::AlwaysFail);

    // `circuit_breaker_min_sample` is 5: five documents failing in the
    // same batch is enough to observe a >=80% failure rate.
    // Distinct `consumed_date`s so the five rows don't collide on the
    // food-log dedup index (P8) and fold into one another.
    for i in 0..5i64 {
        let entry = common::food_entry(&format!("f{i}"), "u1", 1_700_000_000 + i);
        fx.store.save_food_log(&entry).unwrap();
    }

    let report = fx.engine.force_sync().await.unwrap();
    assert_eq!(report.attempted, 5);
    assert_eq!(report.succeeded, 0);

    // Advance past the per-op backoff so the rows would otherwise be
    // ready again, then confirm a second drain is short-circuited by the
    // open breaker rather than re-attempting all five.
    fx.clock.advance(10);
    let second = fx.engine.force_sync().await.unwrap();
    assert_eq!(second.attempted, 0);

    // Still five rows sitting in the queue, untouched by the skipped drain.
    assert_eq!(fx.store.pending_count().unwrap(), 5);
}

#[tokio::test]
async fn the_breaker_resets_after_its_cooldown_and_drains_resume() {
    let fx = common::build(common::fast_config());
    fx.remote.set_failure_mode(FailureMode::AlwaysFail);

    // Distinct `consumed_date`s so the five rows don't collide on the
    // food-log dedup index (P8) and fold into one another.
    for i in 0..5i64 {
        let entry = common::food_entry(&format!("f{i}"), "u1", 1_700_000_000 + i);
        fx.store.save_food_log(&entry).unwrap();
    }
    fx.engine.force_sync().await.unwrap();

    fx.remote.set_failure_mode(FailureMode::None);
    // Past both the per-op backoff ceiling (300s) and the breaker's own
    // 300s reset window.
    fx.clock.advance(301);

    let report = fx.engine.force_sync().await.unwrap();
    assert_eq!(report.attempted, 5);
    assert_eq!(report.succeeded, 5);
}

//! E3: server-authoritative last-write-wins via the version counter, with
//! the divergence recorded rather than silently dropped (spec §4.4.1).

mod common;

use nutrilog_store::{Collection, RemoteStore};
use serde_json::json;

#[tokio::test]
async fn a_newer_server_version_wins_and_is_recorded_as_a_conflict() {
    let fx = common::build(common::fast_config());
    let entry = common::food_entry("f1", "u1", 1_700_000_000);

    // Seed the server ahead of our local baseline (version 1), as if
    // another device already pushed a change for this document.
    fx.remote.seed(
        Collection::FoodLog,
        "f1",
        json!({
            "id": "f1", "user_id": "u1", "food_name": "Toast", "serving_size": 2.0,
            "serving_unit": "unit", "calories": 120.0, "protein_g": 3.0, "carbs_g": 20.0,
            "fat_g": 2.0, "micros": null, "meal_type": "breakfast",
            "consumed_date": 1_700_000_000i64, "logged_at": 1_700_000_000i64
        }),
        1,
    );

    fx.store.save_food_log(&entry).unwrap();
    let report = fx.engine.force_sync().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.conflicts_detected, 1);

    let conflicts = fx.store.conflicts().unresolved().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].document_id, "f1");
    assert_eq!(conflicts[0].server_version, 1);
    assert_eq!(conflicts[0].local_version, 0);

    // The local write still lands (last-write-wins): the remote now holds
    // our data at the bumped version, not the seeded server copy.
    assert_eq!(fx.remote.version_of(Collection::FoodLog, "f1"), Some(2));
    let stored = fx
        .remote
        .get_document(Collection::FoodLog, "f1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.data.get("food_name").and_then(|v| v.as_str()), Some("Egg"));
}

#[tokio::test]
async fn an_uncontested_push_records_no_conflict() {
    let fx = common::build(common::fast_config());
    let entry = common::food_entry("f1", "u1", 1_700_000_000);

    fx.store.save_food_log(&entry).unwrap();
    let report = fx.engine.force_sync().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.conflicts_detected, 0);
    assert!(fx.store.conflicts().unresolved().unwrap().is_empty());
    assert_eq!(fx.remote.version_of(Collection::FoodLog, "f1"), Some(1));
}

//! P1 / E1: a delete beats any in-flight or late save, and nothing
//! resurrects a tombstoned document via import.

mod common;

use nutrilog_store::Collection;
use serde_json::json;

#[tokio::test]
async fn delete_then_late_save_leaves_document_tombstoned() {
    let fx = common::build(common::fast_config());
    let entry = common::food_entry("f1", "u1", 1_700_000_000);

    fx.store.save_food_log(&entry).unwrap();
    fx.store.delete_food_log("f1").unwrap();

    // A save arriving after the delete (e.g. a stale UI callback) must be
    // silently skipped, not resurrect the row.
    let applied = fx.store.save_food_log(&entry).unwrap();
    assert!(!applied);

    assert!(fx.store.get_food_log("f1").unwrap().is_none());

    // Only the delete op should be queued — dedup must not have left an
    // `add`/`update` row behind for the guard to later suppress.
    let ready = fx.store.queue().ready_operations().unwrap();
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].document_id, "f1");
}

#[tokio::test]
async fn drain_hard_deletes_after_remote_confirmation() {
    let fx = common::build(common::fast_config());
    let entry = common::food_entry("f1", "u1", 1_700_000_000);

    fx.store.save_food_log(&entry).unwrap();
    fx.engine.force_sync().await.unwrap();
    fx.store.delete_food_log("f1").unwrap();

    let report = fx.engine.force_sync().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(fx.store.get_food_log("f1").unwrap().is_none());
    assert!(!fx.remote.contains(Collection::FoodLog, "f1"));
}

#[tokio::test]
async fn import_skips_a_locally_tombstoned_document() {
    let fx = common::build(common::fast_config());
    let entry = common::food_entry("f1", "u1", 1_700_000_000);

    fx.store.save_food_log(&entry).unwrap();
    fx.engine.force_sync().await.unwrap();
    fx.store.delete_food_log("f1").unwrap();

    // The server still has the pre-delete document; importing it back
    // must not resurrect the local tombstone.
    let imported = fx
        .store
        .import_remote_document(
            Collection::FoodLog,
            "f1",
            json!({
                "id": "f1", "user_id": "u1", "food_name": "Egg", "serving_size": 1.0,
                "serving_unit": "unit", "calories": 70.0, "protein_g": 6.0, "carbs_g": 0.5,
                "fat_g": 5.0, "micros": null, "meal_type": "breakfast",
                "consumed_date": 1_700_000_000i64, "logged_at": 1_700_000_000i64
            }),
            1,
        )
        .unwrap();

    assert!(!imported);
    assert!(fx.store.get_food_log("f1").unwrap().is_none());
}

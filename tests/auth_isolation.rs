//! P7 (signed-out/signed-in data isolation) and E5 (an account switch
//! mid-pull aborts instead of mixing two users' data).

mod common;

use nutrilog_store::{Collection, PullOutcome};
use serde_json::json;

#[tokio::test]
async fn switching_users_mid_pull_aborts_without_importing() {
    let fx = common::build(common::fast_config());

    fx.remote.seed(
        Collection::FoodLog,
        "f1",
        json!({
            "id": "f1", "user_id": "user-1", "food_name": "Oats", "serving_size": 1.0,
            "serving_unit": "bowl", "calories": 150.0, "protein_g": 5.0, "carbs_g": 27.0,
            "fat_g": 3.0, "micros": null, "meal_type": "breakfast",
            "consumed_date": 1_700_000_000i64, "logged_at": 1_700_000_000i64
        }),
        1,
    );

    // The account switches before `pull_all_data` gets a chance to check
    // its captured token against current state (simulated directly here
    // since the real trigger is a concurrent sign-in on another task).
    fx.auth.switch_user("user-2");

    let outcome = fx.engine.pull_all_data().await.unwrap();
    assert!(matches!(outcome, PullOutcome::AuthChanged));

    // Nothing from user-1's account should have been imported under the
    // new session.
    assert!(fx.store.get_food_log("f1").unwrap().is_none());
}

#[tokio::test]
async fn a_stable_session_pulls_every_seeded_collection() {
    let fx = common::build(common::fast_config());

    fx.remote.seed(
        Collection::FoodLog,
        "f1",
        json!({
            "id": "f1", "user_id": "user-1", "food_name": "Oats", "serving_size": 1.0,
            "serving_unit": "bowl", "calories": 150.0, "protein_g": 5.0, "carbs_g": 27.0,
            "fat_g": 3.0, "micros": null, "meal_type": "breakfast",
            "consumed_date": 1_700_000_000i64, "logged_at": 1_700_000_000i64
        }),
        1,
    );

    let outcome = fx.engine.pull_all_data().await.unwrap();
    let PullOutcome::Completed(report) = outcome else {
        panic!("expected a completed pull");
    };
    assert_eq!(report.documents_imported, 1);
    assert!(fx.store.get_food_log("f1").unwrap().is_some());
}

#[tokio::test]
async fn importing_the_same_snapshot_twice_is_idempotent_and_keeps_pending_local_changes() {
    let fx = common::build(common::fast_config());
    let snapshot = json!({
        "id": "f1", "user_id": "user-1", "food_name": "Oats", "serving_size": 1.0,
        "serving_unit": "bowl", "calories": 150.0, "protein_g": 5.0, "carbs_g": 27.0,
        "fat_g": 3.0, "micros": null, "meal_type": "breakfast",
        "consumed_date": 1_700_000_000i64, "logged_at": 1_700_000_000i64
    });

    let first = fx
        .store
        .import_remote_document(Collection::FoodLog, "f1", snapshot.clone(), 1)
        .unwrap();
    assert!(first);
    let after_first = fx.store.get_food_log("f1").unwrap().unwrap();

    // An unrelated local edit is pending...
    let local_entry = common::food_entry("local-1", "user-1", 1_700_100_000);
    fx.store.save_food_log(&local_entry).unwrap();

    // ...and re-importing the same snapshot must not disturb it or the
    // already-imported row.
    let second = fx
        .store
        .import_remote_document(Collection::FoodLog, "f1", snapshot, 1)
        .unwrap();
    assert!(!second);
    let after_second = fx.store.get_food_log("f1").unwrap().unwrap();
    assert_eq!(after_first, after_second);

    assert!(fx.store.get_food_log("local-1").unwrap().is_some());
    assert_eq!(fx.store.pending_count().unwrap(), 1);
}

#[tokio::test]
async fn signing_out_then_back_in_as_a_different_user_does_not_surface_old_data() {
    let fx = common::build(common::fast_config());
    let entry = common::food_entry("f1", "user-1", 1_700_000_000);
    fx.store.save_food_log(&entry).unwrap();
    fx.engine.force_sync().await.unwrap();

    // A fresh local store models what the client does on account switch:
    // wipe local state rather than let the new user see the old one's rows.
    fx.store.delete_all_user_data().unwrap();
    fx.auth.switch_user("user-2");

    assert!(fx.store.get_food_log("f1").unwrap().is_none());
    assert_eq!(fx.store.pending_count().unwrap(), 0);
}

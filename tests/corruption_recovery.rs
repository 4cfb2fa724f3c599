//! E6: a corrupt database file is quarantined and replaced with a fresh
//! one rather than failing to start, and the replacement is reported so
//! the caller knows to trigger a rehydration pull.

use std::sync::Arc;

use nutrilog_store::{Event, EventBus, FakeClock, LocalStore, SyncConfig};

#[test]
fn a_corrupt_file_is_quarantined_and_a_fresh_store_opens_in_its_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite");
    std::fs::write(&path, b"not a sqlite file").unwrap();

    let clock: Arc<dyn nutrilog_store::Clock> = Arc::new(FakeClock::default());
    let events = EventBus::new();
    let mut recv = events.subscribe();

    let (store, recovered) =
        LocalStore::open(&path, SyncConfig::default(), clock, events).expect("recover and open");

    assert!(recovered);
    assert!(store.get_food_log("anything").unwrap().is_none());

    // The corrupt file was quarantined under a new name, not overwritten.
    let backed_up = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().contains("_corrupt_"));
    assert!(backed_up);
    assert!(path.exists());

    let event = recv.try_recv().expect("a DatabaseRecovered event was published");
    assert!(matches!(event, Event::DatabaseRecovered));
}

#[test]
fn a_healthy_file_reopens_without_touching_its_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite");

    let clock: Arc<dyn nutrilog_store::Clock> = Arc::new(FakeClock::default());
    let events = EventBus::new();
    let (store, recovered) =
        LocalStore::open(&path, SyncConfig::default(), clock.clone(), events.clone()).unwrap();
    assert!(!recovered);

    let entry = nutrilog_store::db::collections::FoodLogEntry {
        id: "f1".to_string(),
        user_id: "u1".to_string(),
        food_name: "Egg".to_string(),
        serving_size: 1.0,
        serving_unit: "unit".to_string(),
        calories: 70.0,
        protein_g: 6.0,
        carbs_g: 0.5,
        fat_g: 5.0,
        micros: None,
        meal_type: "breakfast".to_string(),
        consumed_date: 1_700_000_000,
        logged_at: 1_700_000_000,
    };
    store.save_food_log(&entry).unwrap();
    drop(store);

    let (reopened, recovered_again) =
        LocalStore::open(&path, SyncConfig::default(), clock, events).unwrap();
    assert!(!recovered_again);
    assert!(reopened.get_food_log("f1").unwrap().is_some());
}

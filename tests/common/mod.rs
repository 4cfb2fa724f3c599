//! Shared fixture for the integration suite: wires an in-memory
//! `LocalStore` to a `SyncEngine` backed entirely by the fakes in
//! `test_support` (spec §10.4).

use std::sync::Arc;

use nutrilog_store::test_support::{FakeAuthProvider, FakeNetworkMonitor, InMemoryRemoteStore};
use nutrilog_store::{Clock, EventBus, FakeClock, LocalStore, SyncConfig, SyncEngine};

pub struct Fixture {
    pub store: Arc<LocalStore>,
    pub engine: Arc<SyncEngine>,
    pub remote: Arc<InMemoryRemoteStore>,
    pub auth: Arc<FakeAuthProvider>,
    pub network: Arc<FakeNetworkMonitor>,
    pub clock: Arc<FakeClock>,
    pub events: EventBus,
}

/// Config with every wall-clock window collapsed to single-digit seconds so
/// tests never need to actually sleep.
pub fn fast_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.min_sync_interval = std::time::Duration::from_secs(0);
    config.network_reconnect_debounce = std::time::Duration::from_millis(10);
    config
}

pub fn build(config: SyncConfig) -> Fixture {
    let clock = Arc::new(FakeClock::default());
    let events = EventBus::new();
    let dyn_clock: Arc<dyn Clock> = clock.clone();

    let store = Arc::new(
        LocalStore::open_in_memory(config.clone(), dyn_clock.clone(), events.clone())
            .expect("open in-memory store"),
    );
    let remote = Arc::new(InMemoryRemoteStore::new());
    let auth = Arc::new(FakeAuthProvider::new("user-1"));
    let network = Arc::new(FakeNetworkMonitor::new(true));

    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        remote.clone(),
        auth.clone(),
        network.clone(),
        events.clone(),
        dyn_clock,
        config,
    ));

    Fixture { store, engine, remote, auth, network, clock, events }
}

pub fn food_entry(id: &str, user_id: &str, consumed_date: i64) -> nutrilog_store::db::collections::FoodLogEntry {
    nutrilog_store::db::collections::FoodLogEntry {
        id: id.to_string(),
        user_id: user_id.to_string(),
        food_name: "Egg".to_string(),
        serving_size: 1.0,
        serving_unit: "unit".to_string(),
        calories: 70.0,
        protein_g: 6.0,
        carbs_g: 0.5,
        fat_g: 5.0,
        micros: None,
        meal_type: "breakfast".to_string(),
        consumed_date,
        logged_at: consumed_date,
    }
}

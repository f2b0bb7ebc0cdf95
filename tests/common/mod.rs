use messaging_core::config::Config;
use messaging_core::realtime::fanout::{EventBus, LocalEventBus};
use messaging_core::repository::MemoryStore;
use messaging_core::state::AppState;
use std::sync::Arc;

/// One process's messaging core on an in-memory store and in-process bus.
#[allow(dead_code)]
pub fn test_state() -> (AppState, MemoryStore) {
    test_state_on_bus(Arc::new(LocalEventBus::default()), "test-instance")
}

/// Same, on a shared bus, so a test can model several processes.
#[allow(dead_code)]
pub fn test_state_on_bus(bus: Arc<dyn EventBus>, instance: &str) -> (AppState, MemoryStore) {
    let config = Config {
        instance_name: instance.to_string(),
        ..Config::default()
    };
    let store = MemoryStore::new();
    let state = AppState::new(
        Arc::new(config),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        bus,
    );
    (state, store)
}

//! Test harness over the in-memory collaborators.

use std::sync::Arc;

use returnflow::store::metadata;
use returnflow::{Collaborators, Engine, ExchangeIntent, MemoryStore, ReturnIntent};

use super::fixtures;

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("returnflow=debug")
        .try_init();
}

/// An engine wired to a seeded [`MemoryStore`], with metadata introspection.
pub struct TestApp {
    pub store: MemoryStore,
    pub engine: Arc<Engine>,
}

impl TestApp {
    pub fn new() -> Self {
        init_test_tracing();
        let store = fixtures::seeded_store();
        let engine = Arc::new(Engine::new(Collaborators::from_store(Arc::new(
            store.clone(),
        ))));
        Self { store, engine }
    }

    pub fn return_intent(&self, order_id: &str, return_id: &str) -> ReturnIntent {
        let order = self.store.order(order_id).expect("order exists");
        let intents = metadata::read_return_intents(&order.metadata).expect("readable metadata");
        intents.get(return_id).cloned().expect("return intent exists")
    }

    pub fn exchange_intent(&self, order_id: &str, exchange_id: &str) -> ExchangeIntent {
        let order = self.store.order(order_id).expect("order exists");
        let intents = metadata::read_exchange_intents(&order.metadata).expect("readable metadata");
        intents
            .get(exchange_id)
            .cloned()
            .expect("exchange intent exists")
    }

    /// The flattened state mirror stored next to the intents.
    pub fn metadata_string(&self, order_id: &str, key: &str) -> Option<String> {
        let order = self.store.order(order_id).expect("order exists");
        order
            .metadata
            .get(key)
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }
}

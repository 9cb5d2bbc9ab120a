//! Per-intent mutual exclusion.
//!
//! The intent lives inside an order-scoped metadata document persisted by
//! read-modify-write. Without exclusion, two concurrent operations on the
//! same intent could both pass their checks against stale reads and then
//! both write: overselling inventory, or losing one party's history entry to
//! a last-writer-wins document update. Operations therefore hold a lock
//! keyed by `(order_id, intent_id)` across load, check, move, and persist.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-intent async locks.
///
/// Lock entries are created on first use and kept for the registry's
/// lifetime; the set of intents an engine touches is bounded by its traffic.
#[derive(Default)]
pub struct IntentLocks {
    inner: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl IntentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `(order_id, intent_id)`, waiting if another
    /// operation holds it. The guard releases on drop.
    pub async fn acquire(&self, order_id: &str, intent_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().await;
            map.entry((order_id.to_string(), intent_id.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

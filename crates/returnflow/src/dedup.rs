//! TTL-bounded deduplication for upstream event handlers.
//!
//! Handlers that feed this engine (webhook consumers, bus subscribers) often
//! see the same delivery twice within a short window. Process-local state
//! does not survive restarts or multi-instance deployment, so the contract
//! is a trait; deployments can back it with shared storage while tests and
//! single-node setups use [`MemoryDedup`].

use std::collections::HashMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::error::Result;

/// A keyed, time-windowed "have I seen this" store.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Record `key` if unseen within the window. Returns `true` when the key
    /// is fresh and the caller should process the delivery.
    async fn try_claim(&self, key: &str) -> Result<bool>;
}

/// In-memory dedup store with a fixed TTL window.
pub struct MemoryDedup {
    ttl: Duration,
    seen: Mutex<HashMap<String, OffsetDateTime>>,
}

impl MemoryDedup {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DedupStore for MemoryDedup {
    async fn try_claim(&self, key: &str) -> Result<bool> {
        let now = OffsetDateTime::now_utc();
        let mut seen = self.seen.lock().await;
        seen.retain(|_, at| now - *at < self.ttl);

        if seen.contains_key(key) {
            return Ok(false);
        }
        seen.insert(key.to_string(), now);
        Ok(true)
    }
}

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{EventId, TierId};
use tokio::sync::RwLock;

use crate::{CacheError, StockCache, stock_key};

#[derive(Default)]
struct Inner {
    entries: RwLock<HashMap<String, String>>,
    fail_on_set: AtomicBool,
}

/// In-memory stock cache.
///
/// Process-local map with the same key/value shape as the Redis backend.
/// Cloning yields a handle to the same underlying entries.
#[derive(Clone, Default)]
pub struct InMemoryStockCache {
    inner: Arc<Inner>,
}

impl InMemoryStockCache {
    /// Creates a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the cache to reject writes, for tests that verify cache
    /// failures stay isolated from the reservation outcome.
    pub fn set_fail_on_set(&self, fail: bool) {
        self.inner.fail_on_set.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of cached entries.
    pub async fn entry_count(&self) -> usize {
        self.inner.entries.read().await.len()
    }
}

#[async_trait]
impl StockCache for InMemoryStockCache {
    async fn get(&self, event_id: EventId, tier_id: TierId) -> Result<Option<u32>, CacheError> {
        let key = stock_key(event_id, tier_id);
        let entries = self.inner.entries.read().await;
        match entries.get(&key) {
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| CacheError::Malformed {
                    key: key.clone(),
                    value: raw.clone(),
                }),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        event_id: EventId,
        tier_id: TierId,
        remaining: u32,
    ) -> Result<(), CacheError> {
        if self.inner.fail_on_set.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("injected cache failure".to_string()));
        }
        let key = stock_key(event_id, tier_id);
        self.inner
            .entries
            .write()
            .await
            .insert(key, remaining.to_string());
        Ok(())
    }

    async fn remove(&self, event_id: EventId, tier_id: TierId) -> Result<(), CacheError> {
        let key = stock_key(event_id, tier_id);
        self.inner.entries.write().await.remove(&key);
        Ok(())
    }
}

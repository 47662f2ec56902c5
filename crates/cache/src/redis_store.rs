//! Redis-backed stock cache.

use async_trait::async_trait;
use common::{EventId, TierId};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::{CacheError, StockCache, stock_key};

/// Redis-backed stock cache.
///
/// Values are stored as plain decimal strings under
/// `event:{eventId}:tier:{tierId}`, so entries stay inspectable with
/// `redis-cli`. Connection pooling goes through [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisStockCache {
    conn_manager: ConnectionManager,
}

impl RedisStockCache {
    /// Creates a new Redis stock cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Redis fails.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Backend(format!("failed to create redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Backend(format!("failed to create redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl StockCache for RedisStockCache {
    async fn get(&self, event_id: EventId, tier_id: TierId) -> Result<Option<u32>, CacheError> {
        let mut conn = self.conn_manager.clone();
        let key = stock_key(event_id, tier_id);

        let value: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        match value {
            Some(raw) => raw
                .parse::<u32>()
                .map(Some)
                .map_err(|_| CacheError::Malformed {
                    key,
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
        let mut conn = self.conn_manager.clone();
        let key = stock_key(event_id, tier_id);

        conn.set::<_, _, ()>(&key, remaining.to_string())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn remove(&self, event_id: EventId, tier_id: TierId) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let key = stock_key(event_id, tier_id);

        conn.del::<_, ()>(&key)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}

use async_trait::async_trait;
use common::{EventId, TierId};

use crate::CacheError;

/// Core trait for stock cache implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockCache: Send + Sync {
    /// Reads the cached remaining count for a tier, if present.
    async fn get(&self, event_id: EventId, tier_id: TierId) -> Result<Option<u32>, CacheError>;

    /// Overwrites the cached remaining count for a tier.
    async fn set(&self, event_id: EventId, tier_id: TierId, remaining: u32)
    -> Result<(), CacheError>;

    /// Evicts a tier's entry, if present.
    async fn remove(&self, event_id: EventId, tier_id: TierId) -> Result<(), CacheError>;
}

use async_trait::async_trait;
use common::EventId;
use thiserror::Error;

use crate::StockUpdate;

/// Errors that can occur when publishing to the feed.
///
/// Publish failures are logged by callers and never propagate into a
/// reservation's outcome.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed backend rejected the message.
    #[error("feed backend error: {0}")]
    Backend(String),
}

/// Fire-and-forget publisher of stock updates.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockPublisher: Send + Sync {
    /// Publishes an update to the event's stock topic.
    ///
    /// Returns the number of subscribers that were handed the message;
    /// zero subscribers is a successful no-op.
    async fn publish(&self, event_id: EventId, update: StockUpdate) -> Result<usize, FeedError>;
}

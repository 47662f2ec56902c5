use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EventId;
use tokio::sync::{RwLock, broadcast};

use crate::{FeedError, StockPublisher, StockUpdate};

/// Default per-topic channel capacity.
///
/// Enough buffer to absorb bursts during an on-sale rush while keeping
/// memory bounded; a subscriber that lags past it misses updates.
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

struct Inner {
    topics: RwLock<HashMap<EventId, broadcast::Sender<StockUpdate>>>,
    capacity: usize,
}

/// In-process fan-out of stock updates on per-event topics.
///
/// One instance per process, injected wherever updates are published or
/// consumed. Cloning yields a handle to the same topics.
#[derive(Clone)]
pub struct TopicBroadcaster {
    inner: Arc<Inner>,
}

impl TopicBroadcaster {
    /// Creates a broadcaster with the default per-topic capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Creates a broadcaster with a custom per-topic capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(HashMap::new()),
                capacity,
            }),
        }
    }

    /// Subscribes to an event's stock topic.
    ///
    /// The topic is created on first use; updates published before this
    /// call are not replayed.
    pub async fn subscribe(&self, event_id: EventId) -> broadcast::Receiver<StockUpdate> {
        let mut topics = self.inner.topics.write().await;
        topics
            .entry(event_id)
            .or_insert_with(|| broadcast::channel(self.inner.capacity).0)
            .subscribe()
    }

    /// Returns the number of live topics.
    pub async fn topic_count(&self) -> usize {
        self.inner.topics.read().await.len()
    }
}

impl Default for TopicBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StockPublisher for TopicBroadcaster {
    async fn publish(&self, event_id: EventId, update: StockUpdate) -> Result<usize, FeedError> {
        let topics = self.inner.topics.read().await;
        match topics.get(&event_id) {
            // send only fails when no receiver is listening, which is a
            // successful no-op for a fire-and-forget feed.
            Some(sender) => Ok(sender.send(update).unwrap_or(0)),
            None => Ok(0),
        }
    }
}

//! Live stock update feed.
//!
//! After a purchase commits (or an admin resync lands), the engine publishes
//! the tier's new remaining count on the owning event's topic. Delivery is
//! best-effort: it is never guaranteed, never blocks, and never reverses a
//! committed purchase. Subscribers that fall behind simply miss updates.

pub mod broadcaster;
pub mod publisher;
pub mod update;

pub use broadcaster::{DEFAULT_TOPIC_CAPACITY, TopicBroadcaster};
pub use publisher::{FeedError, StockPublisher};
pub use update::{StockUpdate, topic};

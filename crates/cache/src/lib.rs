//! Advisory cache of remaining stock per tier.
//!
//! The cache mirrors `Tier.available_stock` for cheap reads and UI
//! responsiveness. It is never authoritative and never consulted to decide
//! whether a reservation succeeds; after every ledger mutation it is
//! overwritten with the new authoritative value. A reader may observe a
//! value briefly stale relative to the ledger.
//!
//! Keys follow the shape `event:{eventId}:tier:{tierId}`, values are the
//! decimal string of the remaining count.

pub mod error;
pub mod key;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::CacheError;
pub use key::stock_key;
pub use memory::InMemoryStockCache;
pub use redis_store::RedisStockCache;
pub use store::StockCache;

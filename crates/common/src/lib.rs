//! Shared types used across the reservation engine crates.

pub mod ids;
pub mod money;

pub use ids::{BuyerId, EventId, OrderId, TierId};
pub use money::Money;

//! Pricing tiers with a finite ticket count.

use common::{EventId, Money, TierId};
use serde::{Deserialize, Serialize};

/// A priced category of tickets for an event.
///
/// `available_stock` is never negative. It is mutated only by the reserve
/// path (decrement under the tier's row lock) or an explicit admin resync
/// (absolute set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub id: TierId,
    pub event_id: EventId,
    pub name: String,
    pub price: Money,
    pub available_stock: u32,
}

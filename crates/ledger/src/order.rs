//! Committed orders and journal aggregates.

use chrono::{DateTime, Utc};
use common::{BuyerId, EventId, Money, OrderId, TierId};
use serde::{Deserialize, Serialize};

/// A committed purchase.
///
/// Created exactly once per successful reservation transaction and never
/// mutated afterwards. The tier name and unit price are snapshots taken at
/// purchase time, so later tier edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer: BuyerId,
    pub event_id: EventId,
    pub tier_id: TierId,
    pub tier_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
}

/// Aggregate sales figures over the whole journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTotals {
    pub tickets_sold: u64,
    pub revenue: Money,
}

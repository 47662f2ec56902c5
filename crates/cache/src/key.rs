use common::{EventId, TierId};

/// Returns the cache key for a tier's remaining-stock entry.
pub fn stock_key(event_id: EventId, tier_id: TierId) -> String {
    format!("event:{event_id}:tier:{tier_id}")
}

use common::{EventId, TierId};
use serde::{Deserialize, Serialize};

/// Payload broadcast on an event's stock topic after a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    /// The tier whose stock changed.
    pub tier_id: TierId,
    /// Remaining units after the change.
    pub remaining: u32,
}

/// Returns the topic name for an event's stock updates.
pub fn topic(event_id: EventId) -> String {
    format!("stock/{event_id}")
}

//! Purchase state machine phases.

use serde::{Deserialize, Serialize};

/// The phase of a purchase attempt in its lifecycle.
///
/// Phase transitions:
/// ```text
/// Received ──► LockAcquired ──► StockChecked ──┬──► Decremented ──► OrderPersisted
///                                              └──► Rejected
/// OrderPersisted ──► CacheSynced ──► Broadcast ──► Committed
/// ```
///
/// `CacheSynced` and `Broadcast` are best-effort: a failed cache write or
/// publish skips the phase without leaving the committed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PurchasePhase {
    /// The request has entered the engine.
    #[default]
    Received,

    /// Exclusive access to the tier row was acquired within the bounded wait.
    LockAcquired,

    /// Available stock was compared against the requested quantity under
    /// the lock.
    StockChecked,

    /// Stock was decremented inside the atomic unit.
    Decremented,

    /// The attempt was turned away (terminal state).
    Rejected,

    /// The order record was persisted in the same atomic unit as the
    /// decrement.
    OrderPersisted,

    /// The advisory cache was overwritten with the new remaining value.
    CacheSynced,

    /// The new remaining value was published on the event's topic.
    Broadcast,

    /// The purchase is fully committed (terminal state).
    Committed,
}

impl PurchasePhase {
    /// Returns true if this is a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchasePhase::Committed | PurchasePhase::Rejected)
    }

    /// Returns the phase name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchasePhase::Received => "Received",
            PurchasePhase::LockAcquired => "LockAcquired",
            PurchasePhase::StockChecked => "StockChecked",
            PurchasePhase::Decremented => "Decremented",
            PurchasePhase::Rejected => "Rejected",
            PurchasePhase::OrderPersisted => "OrderPersisted",
            PurchasePhase::CacheSynced => "CacheSynced",
            PurchasePhase::Broadcast => "Broadcast",
            PurchasePhase::Committed => "Committed",
        }
    }
}

impl std::fmt::Display for PurchasePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

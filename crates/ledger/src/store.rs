use std::time::Duration;

use async_trait::async_trait;
use common::{BuyerId, EventId, TierId};

use crate::{NewTicketEvent, Order, Result, SalesTotals, TicketEvent, Tier};

/// How long a reservation waits for a tier's row lock before failing
/// with [`LedgerError::LockBusy`](crate::LedgerError::LockBusy).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// The result of a committed reservation.
#[derive(Debug, Clone)]
pub struct Reservation {
    /// The order created inside the atomic unit.
    pub order: Order,
    /// Stock left on the tier after the decrement.
    pub remaining: u32,
}

/// Core trait for ledger implementations.
///
/// The ledger is authoritative: conservation of inventory is enforced here
/// and nowhere else. All implementations must be thread-safe.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Atomically reserves `quantity` units of a tier for a buyer.
    ///
    /// Acquires exclusive access to the tier row (bounded wait), checks
    /// `available_stock >= quantity` under the lock, then decrements the
    /// stock and inserts the order in one atomic unit. Either both writes
    /// land or neither does.
    ///
    /// Contention for the same tier is served in lock-acquisition order;
    /// no fairness beyond the underlying lock is guaranteed. Requests for
    /// different tiers proceed in parallel.
    async fn reserve(
        &self,
        event_id: EventId,
        tier_id: TierId,
        buyer: &BuyerId,
        quantity: u32,
    ) -> Result<Reservation>;

    /// Sets a tier's stock to an absolute value, bypassing the reserve path.
    ///
    /// Admin-only and idempotent: repeated calls with the same amount
    /// produce the same state.
    async fn resync_stock(&self, tier_id: TierId, amount: u32) -> Result<Tier>;

    /// Authors a new event together with its tiers, in one transaction.
    async fn create_event(&self, event: NewTicketEvent) -> Result<TicketEvent>;

    /// Deletes an event, cascading to its tiers and orders in the same
    /// transaction.
    async fn delete_event(&self, event_id: EventId) -> Result<()>;

    /// Looks up an event by id.
    async fn get_event(&self, event_id: EventId) -> Result<Option<TicketEvent>>;

    /// Looks up a tier by id.
    async fn get_tier(&self, tier_id: TierId) -> Result<Option<Tier>>;

    /// Lists the tiers owned by an event.
    async fn list_tiers(&self, event_id: EventId) -> Result<Vec<Tier>>;

    /// Lists every tier in the ledger (used by the resync sweep).
    async fn all_tiers(&self) -> Result<Vec<Tier>>;
}

/// Read access to the append-only order journal.
///
/// Orders are written only by [`Ledger::reserve`]; collaborators (buyer
/// order history, admin reporting) read them through this trait.
#[async_trait]
pub trait OrderJournal: Send + Sync {
    /// All orders committed by a buyer, oldest first.
    async fn orders_for_buyer(&self, buyer: &BuyerId) -> Result<Vec<Order>>;

    /// All orders committed against an event, oldest first.
    async fn orders_for_event(&self, event_id: EventId) -> Result<Vec<Order>>;

    /// Number of orders committed against a tier.
    async fn order_count_for_tier(&self, tier_id: TierId) -> Result<u64>;

    /// Aggregate tickets-sold and revenue figures across the journal.
    async fn sales_totals(&self) -> Result<SalesTotals>;
}

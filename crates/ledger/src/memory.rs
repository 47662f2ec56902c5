use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{BuyerId, EventId, OrderId, TierId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::store::DEFAULT_LOCK_TIMEOUT;
use crate::{
    Ledger, LedgerError, NewTicketEvent, Order, OrderJournal, Reservation, Result, SalesTotals,
    TicketEvent, Tier,
};

#[derive(Default)]
struct LedgerState {
    events: HashMap<EventId, TicketEvent>,
    tiers: HashMap<TierId, Tier>,
    orders: Vec<Order>,
}

struct Inner {
    state: RwLock<LedgerState>,
    /// One row lock per tier. Reservations serialize on these; everything
    /// else goes straight to `state`.
    row_locks: Mutex<HashMap<TierId, Arc<Mutex<()>>>>,
    lock_timeout: Duration,
    fail_next_commit: AtomicBool,
}

/// In-memory ledger implementation.
///
/// Provides the same interface and locking semantics as the PostgreSQL
/// implementation: exclusive per-tier row locks with a bounded wait, and
/// an atomic decrement-plus-order-insert commit. Cloning yields a handle
/// to the same underlying state.
#[derive(Clone)]
pub struct InMemoryLedger {
    inner: Arc<Inner>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger with the default lock timeout.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a ledger with a custom row-lock wait bound.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(LedgerState::default()),
                row_locks: Mutex::new(HashMap::new()),
                lock_timeout,
                fail_next_commit: AtomicBool::new(false),
            }),
        }
    }

    async fn row_lock(&self, tier_id: TierId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.row_locks.lock().await;
        locks.entry(tier_id).or_default().clone()
    }

    /// Acquires and holds a tier's row lock, for tests that need to provoke
    /// a lock-wait timeout. Reservations for the tier block until the
    /// returned guard is dropped.
    pub async fn hold_row_lock(&self, tier_id: TierId) -> OwnedMutexGuard<()> {
        self.row_lock(tier_id).await.lock_owned().await
    }

    /// Makes the next reserve commit fail with a persistence error, for
    /// tests of the rollback path. The flag clears itself after one use.
    pub fn set_fail_next_commit(&self, fail: bool) {
        self.inner.fail_next_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the total number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.inner.state.read().await.orders.len()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn reserve(
        &self,
        event_id: EventId,
        tier_id: TierId,
        buyer: &BuyerId,
        quantity: u32,
    ) -> Result<Reservation> {
        let row_lock = self.row_lock(tier_id).await;
        let _row_guard = tokio::time::timeout(self.inner.lock_timeout, row_lock.lock_owned())
            .await
            .map_err(|_| LedgerError::LockBusy(tier_id))?;

        // Exclusive for this tier from here on. The write guard below makes
        // the check + decrement + order insert one atomic unit.
        let mut state = self.inner.state.write().await;

        if !state.events.contains_key(&event_id) {
            return Err(LedgerError::EventNotFound(event_id));
        }
        let (tier_name, unit_price, available) = match state.tiers.get(&tier_id) {
            Some(tier) if tier.event_id == event_id => {
                (tier.name.clone(), tier.price, tier.available_stock)
            }
            _ => return Err(LedgerError::TierNotFound(tier_id)),
        };
        if available < quantity {
            return Err(LedgerError::InsufficientStock {
                tier_id,
                requested: quantity,
                available,
            });
        }
        if self.inner.fail_next_commit.swap(false, Ordering::SeqCst) {
            // Nothing has been mutated yet, so bailing out here leaves the
            // ledger exactly as it was before the attempt.
            return Err(LedgerError::Persistence(
                "injected commit failure".to_string(),
            ));
        }

        let remaining = available - quantity;
        if let Some(tier) = state.tiers.get_mut(&tier_id) {
            tier.available_stock = remaining;
        }
        let order = Order {
            id: OrderId::new(),
            buyer: buyer.clone(),
            event_id,
            tier_id,
            tier_name,
            unit_price,
            quantity,
            total_amount: unit_price.times(quantity),
            created_at: Utc::now(),
        };
        state.orders.push(order.clone());

        Ok(Reservation { order, remaining })
    }

    async fn resync_stock(&self, tier_id: TierId, amount: u32) -> Result<Tier> {
        let mut state = self.inner.state.write().await;
        let tier = state
            .tiers
            .get_mut(&tier_id)
            .ok_or(LedgerError::TierNotFound(tier_id))?;
        tier.available_stock = amount;
        Ok(tier.clone())
    }

    async fn create_event(&self, event: NewTicketEvent) -> Result<TicketEvent> {
        let mut state = self.inner.state.write().await;
        let created = TicketEvent {
            id: EventId::new(),
            title: event.title,
            created_at: Utc::now(),
        };
        state.events.insert(created.id, created.clone());
        for tier in event.tiers {
            let tier = Tier {
                id: TierId::new(),
                event_id: created.id,
                name: tier.name,
                price: tier.price,
                available_stock: tier.initial_stock,
            };
            state.tiers.insert(tier.id, tier);
        }
        Ok(created)
    }

    async fn delete_event(&self, event_id: EventId) -> Result<()> {
        let removed_tiers = {
            let mut state = self.inner.state.write().await;
            if state.events.remove(&event_id).is_none() {
                return Err(LedgerError::EventNotFound(event_id));
            }
            let removed: Vec<TierId> = state
                .tiers
                .values()
                .filter(|t| t.event_id == event_id)
                .map(|t| t.id)
                .collect();
            state.tiers.retain(|_, t| t.event_id != event_id);
            state.orders.retain(|o| o.event_id != event_id);
            removed
        };

        let mut locks = self.inner.row_locks.lock().await;
        for tier_id in removed_tiers {
            locks.remove(&tier_id);
        }
        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<TicketEvent>> {
        Ok(self.inner.state.read().await.events.get(&event_id).cloned())
    }

    async fn get_tier(&self, tier_id: TierId) -> Result<Option<Tier>> {
        Ok(self.inner.state.read().await.tiers.get(&tier_id).cloned())
    }

    async fn list_tiers(&self, event_id: EventId) -> Result<Vec<Tier>> {
        let state = self.inner.state.read().await;
        let mut tiers: Vec<Tier> = state
            .tiers
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        tiers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tiers)
    }

    async fn all_tiers(&self) -> Result<Vec<Tier>> {
        Ok(self.inner.state.read().await.tiers.values().cloned().collect())
    }
}

#[async_trait]
impl OrderJournal for InMemoryLedger {
    async fn orders_for_buyer(&self, buyer: &BuyerId) -> Result<Vec<Order>> {
        let state = self.inner.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| &o.buyer == buyer)
            .cloned()
            .collect())
    }

    async fn orders_for_event(&self, event_id: EventId) -> Result<Vec<Order>> {
        let state = self.inner.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn order_count_for_tier(&self, tier_id: TierId) -> Result<u64> {
        let state = self.inner.state.read().await;
        Ok(state.orders.iter().filter(|o| o.tier_id == tier_id).count() as u64)
    }

    async fn sales_totals(&self) -> Result<SalesTotals> {
        let state = self.inner.state.read().await;
        Ok(SalesTotals {
            tickets_sold: state.orders.iter().map(|o| u64::from(o.quantity)).sum(),
            revenue: state.orders.iter().map(|o| o.total_amount).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    async fn seeded(stock: u32) -> (InMemoryLedger, EventId, TierId) {
        let ledger = InMemoryLedger::new();
        let event = ledger
            .create_event(
                NewTicketEvent::new("Test Event").with_tier("VIP", Money::from_cents(5000), stock),
            )
            .await
            .unwrap();
        let tier = ledger.list_tiers(event.id).await.unwrap().remove(0);
        (ledger, event.id, tier.id)
    }

    #[tokio::test]
    async fn reserve_decrements_stock_and_records_order() {
        let (ledger, event_id, tier_id) = seeded(10).await;
        let buyer = BuyerId::new("alice@example.com");

        let reservation = ledger.reserve(event_id, tier_id, &buyer, 3).await.unwrap();

        assert_eq!(reservation.remaining, 7);
        assert_eq!(reservation.order.quantity, 3);
        assert_eq!(reservation.order.tier_name, "VIP");
        assert_eq!(reservation.order.total_amount.cents(), 15_000);

        let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
        assert_eq!(tier.available_stock, 7);
        assert_eq!(ledger.order_count_for_tier(tier_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reserve_rejects_insufficient_stock_without_mutation() {
        let (ledger, event_id, tier_id) = seeded(2).await;
        let buyer = BuyerId::new("bob@example.com");

        let err = ledger
            .reserve(event_id, tier_id, &buyer, 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));

        let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
        assert_eq!(tier.available_stock, 2);
        assert_eq!(ledger.order_count().await, 0);
    }

    #[tokio::test]
    async fn reserve_unknown_tier_fails() {
        let (ledger, event_id, _) = seeded(1).await;
        let err = ledger
            .reserve(event_id, TierId::new(), &BuyerId::new("x"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TierNotFound(_)));
    }

    #[tokio::test]
    async fn reserve_tier_of_other_event_fails() {
        let (ledger, _, tier_id) = seeded(1).await;
        let other = ledger
            .create_event(NewTicketEvent::new("Other"))
            .await
            .unwrap();
        let err = ledger
            .reserve(other.id, tier_id, &BuyerId::new("x"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TierNotFound(_)));
    }

    #[tokio::test]
    async fn reserve_unknown_event_fails() {
        let (ledger, _, tier_id) = seeded(1).await;
        let err = ledger
            .reserve(EventId::new(), tier_id, &BuyerId::new("x"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::EventNotFound(_)));
    }

    #[tokio::test]
    async fn held_row_lock_times_out_as_busy() {
        let ledger = InMemoryLedger::with_lock_timeout(Duration::from_millis(50));
        let event = ledger
            .create_event(NewTicketEvent::new("E").with_tier("GA", Money::from_cents(100), 5))
            .await
            .unwrap();
        let tier_id = ledger.list_tiers(event.id).await.unwrap().remove(0).id;

        let guard = ledger.hold_row_lock(tier_id).await;
        let err = ledger
            .reserve(event.id, tier_id, &BuyerId::new("x"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::LockBusy(_)));

        // A timed-out attempt leaves the ledger untouched.
        let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
        assert_eq!(tier.available_stock, 5);
        assert_eq!(ledger.order_count().await, 0);

        drop(guard);
        ledger
            .reserve(event.id, tier_id, &BuyerId::new("x"), 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn injected_commit_failure_rolls_back_everything() {
        let (ledger, event_id, tier_id) = seeded(4).await;
        ledger.set_fail_next_commit(true);

        let err = ledger
            .reserve(event_id, tier_id, &BuyerId::new("x"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Persistence(_)));

        let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
        assert_eq!(tier.available_stock, 4);
        assert_eq!(ledger.order_count().await, 0);

        // The fault was transient; the next attempt commits.
        let reservation = ledger
            .reserve(event_id, tier_id, &BuyerId::new("x"), 1)
            .await
            .unwrap();
        assert_eq!(reservation.remaining, 3);
    }

    #[tokio::test]
    async fn resync_is_idempotent() {
        let (ledger, _, tier_id) = seeded(10).await;

        let first = ledger.resync_stock(tier_id, 42).await.unwrap();
        let second = ledger.resync_stock(tier_id, 42).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.available_stock, 42);
    }

    #[tokio::test]
    async fn delete_event_cascades_tiers_and_orders() {
        let (ledger, event_id, tier_id) = seeded(5).await;
        ledger
            .reserve(event_id, tier_id, &BuyerId::new("x"), 2)
            .await
            .unwrap();

        ledger.delete_event(event_id).await.unwrap();

        assert!(ledger.get_event(event_id).await.unwrap().is_none());
        assert!(ledger.get_tier(tier_id).await.unwrap().is_none());
        assert_eq!(ledger.order_count().await, 0);

        let err = ledger.delete_event(event_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::EventNotFound(_)));
    }

    #[tokio::test]
    async fn conservation_holds_after_mixed_outcomes() {
        let (ledger, event_id, tier_id) = seeded(10).await;
        let buyer = BuyerId::new("alice@example.com");

        ledger.reserve(event_id, tier_id, &buyer, 4).await.unwrap();
        ledger.reserve(event_id, tier_id, &buyer, 5).await.unwrap();
        // Declined: only 1 left.
        ledger
            .reserve(event_id, tier_id, &buyer, 2)
            .await
            .unwrap_err();

        let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
        let sold: u32 = ledger
            .orders_for_event(event_id)
            .await
            .unwrap()
            .iter()
            .map(|o| o.quantity)
            .sum();
        assert_eq!(tier.available_stock + sold, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reserves_never_oversell() {
        let (ledger, event_id, tier_id) = seeded(1).await;

        let a = {
            let ledger = ledger.clone();
            let buyer = BuyerId::new("a");
            tokio::spawn(async move { ledger.reserve(event_id, tier_id, &buyer, 1).await })
        };
        let b = {
            let ledger = ledger.clone();
            let buyer = BuyerId::new("b");
            tokio::spawn(async move { ledger.reserve(event_id, tier_id, &buyer, 1).await })
        };

        let outcomes = [a.await.unwrap(), b.await.unwrap()];
        let accepted = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 1);

        let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
        assert_eq!(tier.available_stock, 0);
        assert_eq!(ledger.order_count().await, 1);
    }

    #[tokio::test]
    async fn sales_totals_aggregate_the_journal() {
        let (ledger, event_id, tier_id) = seeded(10).await;
        ledger
            .reserve(event_id, tier_id, &BuyerId::new("a"), 2)
            .await
            .unwrap();
        ledger
            .reserve(event_id, tier_id, &BuyerId::new("b"), 1)
            .await
            .unwrap();

        let totals = ledger.sales_totals().await.unwrap();
        assert_eq!(totals.tickets_sold, 3);
        assert_eq!(totals.revenue.cents(), 15_000);
    }
}

//! The reservation engine.

use cache::StockCache;
use common::{BuyerId, EventId, TierId};
use feed::{StockPublisher, StockUpdate};
use ledger::{Ledger, NewTicketEvent, Order, OrderJournal, SalesTotals, TicketEvent, Tier};

use crate::{PurchasePhase, ReservationError};

/// The receipt for a committed purchase.
#[derive(Debug, Clone)]
pub struct Purchase {
    /// The order created inside the atomic ledger unit.
    pub order: Order,
    /// Stock left on the tier after the decrement.
    pub remaining: u32,
    /// The phase trail of the attempt, ending in
    /// [`PurchasePhase::Committed`]. Best-effort phases that failed are
    /// absent from the trail.
    pub phases: Vec<PurchasePhase>,
}

/// Orchestrates purchase attempts across the ledger, cache, and feed.
///
/// The ledger is the single source of truth; the engine delegates the
/// atomic unit (bounded lock wait, stock check, decrement plus order
/// insert) to it and handles only the advisory tail. The cache and feed
/// are injected, stateless handles, one instance per process.
pub struct ReservationEngine<L, C, P>
where
    L: Ledger + OrderJournal,
    C: StockCache,
    P: StockPublisher,
{
    ledger: L,
    cache: C,
    feed: P,
}

impl<L, C, P> ReservationEngine<L, C, P>
where
    L: Ledger + OrderJournal,
    C: StockCache,
    P: StockPublisher,
{
    /// Creates a new engine over the given collaborators.
    pub fn new(ledger: L, cache: C, feed: P) -> Self {
        Self {
            ledger,
            cache,
            feed,
        }
    }

    /// Returns a reference to the underlying ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Attempts to reserve `quantity` units of a tier for a buyer.
    ///
    /// Whoever acquires the tier's row lock first is served; requests that
    /// time out waiting receive [`ReservationError::Busy`] and may be
    /// resubmitted by the caller. On success the cache and the event's
    /// stock topic are updated best-effort.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        event_id: EventId,
        tier_id: TierId,
        buyer: &BuyerId,
        quantity: u32,
    ) -> Result<Purchase, ReservationError> {
        metrics::counter!("reservations_total").increment(1);
        let started = std::time::Instant::now();
        let mut phases = vec![PurchasePhase::Received];

        if quantity == 0 {
            return Err(ReservationError::InvalidQuantity);
        }

        let reservation = match self.ledger.reserve(event_id, tier_id, buyer, quantity).await {
            Ok(reservation) => reservation,
            Err(e) => {
                let err = ReservationError::from(e);
                match &err {
                    ReservationError::InsufficientStock {
                        requested,
                        available,
                    } => {
                        metrics::counter!("reservations_declined").increment(1);
                        tracing::info!(requested, available, "reservation declined");
                    }
                    ReservationError::Busy(_) => {
                        metrics::counter!("reservations_busy").increment(1);
                        tracing::warn!("row lock wait timed out");
                    }
                    ReservationError::EventNotFound(_) | ReservationError::TierNotFound(_) => {
                        tracing::info!(error = %err, "reservation against unknown target");
                    }
                    other => {
                        metrics::counter!("reservation_failures").increment(1);
                        tracing::error!(error = %other, "reservation aborted, transaction rolled back");
                    }
                }
                metrics::histogram!("reservation_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                return Err(err);
            }
        };

        // The atomic unit committed: lock was held, stock checked and
        // decremented, order persisted. Everything below is advisory.
        phases.extend([
            PurchasePhase::LockAcquired,
            PurchasePhase::StockChecked,
            PurchasePhase::Decremented,
            PurchasePhase::OrderPersisted,
        ]);

        match self.cache.set(event_id, tier_id, reservation.remaining).await {
            Ok(()) => phases.push(PurchasePhase::CacheSynced),
            Err(e) => {
                metrics::counter!("cache_sync_failures").increment(1);
                tracing::warn!(error = %e, "cache sync failed, order is safe");
            }
        }

        let update = StockUpdate {
            tier_id,
            remaining: reservation.remaining,
        };
        match self.feed.publish(event_id, update).await {
            Ok(receivers) => {
                metrics::counter!("stock_updates_published").increment(1);
                tracing::debug!(receivers, "stock update broadcast");
                phases.push(PurchasePhase::Broadcast);
            }
            Err(e) => {
                tracing::warn!(error = %e, "stock update publish failed, order is safe");
            }
        }

        phases.push(PurchasePhase::Committed);
        metrics::counter!("reservations_accepted").increment(1);
        metrics::histogram!("reservation_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %reservation.order.id,
            remaining = reservation.remaining,
            "reservation committed"
        );

        Ok(Purchase {
            order: reservation.order,
            remaining: reservation.remaining,
            phases,
        })
    }

    /// Returns the remaining stock for a tier.
    ///
    /// Cache-first; a miss (or cache fault) falls back to the ledger and
    /// backfills the cache best-effort.
    #[tracing::instrument(skip(self))]
    pub async fn remaining(
        &self,
        event_id: EventId,
        tier_id: TierId,
    ) -> Result<u32, ReservationError> {
        match self.cache.get(event_id, tier_id).await {
            Ok(Some(remaining)) => return Ok(remaining),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, falling back to ledger");
            }
        }

        let tier = self
            .ledger
            .get_tier(tier_id)
            .await?
            .filter(|t| t.event_id == event_id)
            .ok_or(ReservationError::TierNotFound(tier_id))?;

        if let Err(e) = self
            .cache
            .set(event_id, tier_id, tier.available_stock)
            .await
        {
            tracing::warn!(error = %e, "cache backfill failed");
        }
        Ok(tier.available_stock)
    }

    /// Sets a tier's stock to an absolute value and forces the cache and
    /// feed to match the ledger. Admin-only; idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn resync_tier(
        &self,
        event_id: EventId,
        tier_id: TierId,
        amount: u32,
    ) -> Result<u32, ReservationError> {
        self.ledger
            .get_tier(tier_id)
            .await?
            .filter(|t| t.event_id == event_id)
            .ok_or(ReservationError::TierNotFound(tier_id))?;

        let tier = self.ledger.resync_stock(tier_id, amount).await?;
        self.sync_satellites(event_id, tier_id, tier.available_stock)
            .await;
        tracing::info!(remaining = tier.available_stock, "tier stock resynchronized");
        Ok(tier.available_stock)
    }

    /// Rewrites every tier's cache entry from the ledger and republishes
    /// the counts. Used after server restarts or manual admin syncs.
    #[tracing::instrument(skip(self))]
    pub async fn resync_all(&self) -> Result<usize, ReservationError> {
        let tiers = self.ledger.all_tiers().await?;
        for tier in &tiers {
            self.sync_satellites(tier.event_id, tier.id, tier.available_stock)
                .await;
        }
        tracing::info!(tiers = tiers.len(), "cache resynchronized from ledger");
        Ok(tiers.len())
    }

    /// Authors a new event with its tiers and hydrates the cache for each.
    #[tracing::instrument(skip(self, event), fields(title = %event.title))]
    pub async fn open_event(
        &self,
        event: NewTicketEvent,
    ) -> Result<(TicketEvent, Vec<Tier>), ReservationError> {
        let created = self.ledger.create_event(event).await?;
        let tiers = self.ledger.list_tiers(created.id).await?;
        for tier in &tiers {
            self.sync_satellites(created.id, tier.id, tier.available_stock)
                .await;
        }
        tracing::info!(event_id = %created.id, tiers = tiers.len(), "event opened");
        Ok((created, tiers))
    }

    /// Deletes an event (cascading to tiers and orders at the storage
    /// layer) and evicts its cache entries.
    #[tracing::instrument(skip(self))]
    pub async fn close_event(&self, event_id: EventId) -> Result<(), ReservationError> {
        let tiers = self.ledger.list_tiers(event_id).await?;
        self.ledger.delete_event(event_id).await?;
        for tier in &tiers {
            if let Err(e) = self.cache.remove(event_id, tier.id).await {
                tracing::warn!(error = %e, tier_id = %tier.id, "cache eviction failed");
            }
        }
        tracing::info!(tiers = tiers.len(), "event closed");
        Ok(())
    }

    /// All orders committed by a buyer.
    pub async fn orders_for_buyer(&self, buyer: &BuyerId) -> Result<Vec<Order>, ReservationError> {
        Ok(self.ledger.orders_for_buyer(buyer).await?)
    }

    /// All orders committed against an event.
    pub async fn orders_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Order>, ReservationError> {
        Ok(self.ledger.orders_for_event(event_id).await?)
    }

    /// Aggregate tickets-sold and revenue figures across the journal.
    pub async fn sales_totals(&self) -> Result<SalesTotals, ReservationError> {
        Ok(self.ledger.sales_totals().await?)
    }

    /// Overwrites the cache and publishes the count, logging failures.
    /// Neither can affect the ledger state that was just committed.
    async fn sync_satellites(&self, event_id: EventId, tier_id: TierId, remaining: u32) {
        if let Err(e) = self.cache.set(event_id, tier_id, remaining).await {
            metrics::counter!("cache_sync_failures").increment(1);
            tracing::warn!(error = %e, %tier_id, "cache sync failed");
        }
        if let Err(e) = self
            .feed
            .publish(event_id, StockUpdate { tier_id, remaining })
            .await
        {
            tracing::warn!(error = %e, %tier_id, "stock update publish failed");
        }
    }
}

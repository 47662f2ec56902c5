use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, EventId, Money, OrderId, TierId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::store::DEFAULT_LOCK_TIMEOUT;
use crate::{
    Ledger, LedgerError, NewTicketEvent, Order, OrderJournal, Reservation, Result, SalesTotals,
    TicketEvent, Tier,
};

/// PostgreSQL-backed ledger implementation.
///
/// The reserve path takes a `FOR UPDATE` row lock on the tier under a
/// transaction-local `lock_timeout`, so concurrent reservers of the same
/// tier serialize in the database and a slow holder surfaces as
/// [`LedgerError::LockBusy`] instead of blocking indefinitely.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger with the default lock timeout.
    pub fn new(pool: PgPool) -> Self {
        Self::with_lock_timeout(pool, DEFAULT_LOCK_TIMEOUT)
    }

    /// Creates a ledger with a custom row-lock wait bound.
    pub fn with_lock_timeout(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn map_lock_error(e: sqlx::Error, tier_id: TierId) -> LedgerError {
        // 55P03 = lock_not_available, raised when lock_timeout expires.
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.code().as_deref() == Some("55P03")
        {
            return LedgerError::LockBusy(tier_id);
        }
        LedgerError::Database(e)
    }

    fn row_to_event(row: &PgRow) -> Result<TicketEvent> {
        Ok(TicketEvent {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            title: row.try_get("title")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    fn row_to_tier(row: &PgRow) -> Result<Tier> {
        Ok(Tier {
            id: TierId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get::<i64, _>("price_cents")?),
            available_stock: row.try_get::<i32, _>("available_stock")? as u32,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            buyer: BuyerId::new(row.try_get::<String, _>("buyer")?),
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            tier_id: TierId::from_uuid(row.try_get::<Uuid, _>("tier_id")?),
            tier_name: row.try_get("tier_name")?,
            unit_price: Money::from_cents(row.try_get::<i64, _>("unit_price_cents")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            total_amount: Money::from_cents(row.try_get::<i64, _>("total_cents")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn reserve(
        &self,
        event_id: EventId,
        tier_id: TierId,
        buyer: &BuyerId,
        quantity: u32,
    ) -> Result<Reservation> {
        let mut tx = self.pool.begin().await?;

        // Bounded wait for the row lock below; transaction-local so it
        // cannot leak into pooled connections.
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(self.lock_timeout.as_millis().to_string())
            .execute(&mut *tx)
            .await?;

        let event_row = sqlx::query("SELECT id FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if event_row.is_none() {
            return Err(LedgerError::EventNotFound(event_id));
        }

        let row = sqlx::query(
            r#"
            SELECT name, price_cents, available_stock
            FROM tiers
            WHERE id = $1 AND event_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tier_id.as_uuid())
        .bind(event_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Self::map_lock_error(e, tier_id))?;

        let Some(row) = row else {
            return Err(LedgerError::TierNotFound(tier_id));
        };

        let tier_name: String = row.try_get("name")?;
        let unit_price = Money::from_cents(row.try_get::<i64, _>("price_cents")?);
        let available = row.try_get::<i32, _>("available_stock")? as u32;

        if available < quantity {
            // Dropping the transaction releases the row lock with no writes.
            return Err(LedgerError::InsufficientStock {
                tier_id,
                requested: quantity,
                available,
            });
        }
        let remaining = available - quantity;

        sqlx::query("UPDATE tiers SET available_stock = $1 WHERE id = $2")
            .bind(remaining as i32)
            .bind(tier_id.as_uuid())
            .execute(&mut *tx)
            .await?;

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

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, buyer, event_id, tier_id, tier_name, unit_price_cents, quantity, total_cents, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer.as_str())
        .bind(order.event_id.as_uuid())
        .bind(order.tier_id.as_uuid())
        .bind(&order.tier_name)
        .bind(order.unit_price.cents())
        .bind(order.quantity as i32)
        .bind(order.total_amount.cents())
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Reservation { order, remaining })
    }

    async fn resync_stock(&self, tier_id: TierId, amount: u32) -> Result<Tier> {
        let row = sqlx::query(
            r#"
            UPDATE tiers SET available_stock = $1
            WHERE id = $2
            RETURNING id, event_id, name, price_cents, available_stock
            "#,
        )
        .bind(amount as i32)
        .bind(tier_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_tier(&row),
            None => Err(LedgerError::TierNotFound(tier_id)),
        }
    }

    async fn create_event(&self, event: NewTicketEvent) -> Result<TicketEvent> {
        let mut tx = self.pool.begin().await?;

        let created = TicketEvent {
            id: EventId::new(),
            title: event.title,
            created_at: Utc::now(),
        };
        sqlx::query("INSERT INTO events (id, title, created_at) VALUES ($1, $2, $3)")
            .bind(created.id.as_uuid())
            .bind(&created.title)
            .bind(created.created_at)
            .execute(&mut *tx)
            .await?;

        for tier in event.tiers {
            sqlx::query(
                r#"
                INSERT INTO tiers (id, event_id, name, price_cents, available_stock)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(TierId::new().as_uuid())
            .bind(created.id.as_uuid())
            .bind(&tier.name)
            .bind(tier.price.cents())
            .bind(tier.initial_stock as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn delete_event(&self, event_id: EventId) -> Result<()> {
        // Tiers and orders go with the event through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::EventNotFound(event_id));
        }
        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<TicketEvent>> {
        let row = sqlx::query("SELECT id, title, created_at FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::row_to_event(&r)).transpose()
    }

    async fn get_tier(&self, tier_id: TierId) -> Result<Option<Tier>> {
        let row = sqlx::query(
            "SELECT id, event_id, name, price_cents, available_stock FROM tiers WHERE id = $1",
        )
        .bind(tier_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::row_to_tier(&r)).transpose()
    }

    async fn list_tiers(&self, event_id: EventId) -> Result<Vec<Tier>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_id, name, price_cents, available_stock
            FROM tiers
            WHERE event_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_tier).collect()
    }

    async fn all_tiers(&self) -> Result<Vec<Tier>> {
        let rows =
            sqlx::query("SELECT id, event_id, name, price_cents, available_stock FROM tiers")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(Self::row_to_tier).collect()
    }
}

#[async_trait]
impl OrderJournal for PostgresLedger {
    async fn orders_for_buyer(&self, buyer: &BuyerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, buyer, event_id, tier_id, tier_name, unit_price_cents, quantity, total_cents, created_at
            FROM orders
            WHERE buyer = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(buyer.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn orders_for_event(&self, event_id: EventId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, buyer, event_id, tier_id, tier_name, unit_price_cents, quantity, total_cents, created_at
            FROM orders
            WHERE event_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn order_count_for_tier(&self, tier_id: TierId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE tier_id = $1")
            .bind(tier_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    async fn sales_totals(&self) -> Result<SalesTotals> {
        // COALESCE keeps the dashboard at zero instead of NULL when the
        // journal is empty.
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(quantity), 0)::BIGINT AS tickets_sold,
                COALESCE(SUM(total_cents), 0)::BIGINT AS revenue_cents
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesTotals {
            tickets_sold: row.try_get::<i64, _>("tickets_sold")? as u64,
            revenue: Money::from_cents(row.try_get::<i64, _>("revenue_cents")?),
        })
    }
}

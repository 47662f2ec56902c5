//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{BuyerId, EventId, Money, TierId};
use ledger::{Ledger, LedgerError, NewTicketEvent, OrderJournal, PostgresLedger};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_ledger_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PostgresLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation
    sqlx::query("TRUNCATE TABLE orders, tiers, events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedger::new(pool)
}

async fn seed_event(ledger: &PostgresLedger, stock: u32) -> (EventId, TierId) {
    let event = ledger
        .create_event(
            NewTicketEvent::new("Integration Night").with_tier(
                "VIP",
                Money::from_cents(2500),
                stock,
            ),
        )
        .await
        .unwrap();
    let tier = ledger.list_tiers(event.id).await.unwrap().remove(0);
    (event.id, tier.id)
}

#[tokio::test]
async fn reserve_commits_stock_and_order_atomically() {
    let ledger = get_test_ledger().await;
    let (event_id, tier_id) = seed_event(&ledger, 10).await;
    let buyer = BuyerId::new("alice@example.com");

    let reservation = ledger.reserve(event_id, tier_id, &buyer, 4).await.unwrap();
    assert_eq!(reservation.remaining, 6);
    assert_eq!(reservation.order.total_amount.cents(), 10_000);

    let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
    assert_eq!(tier.available_stock, 6);
    assert_eq!(ledger.order_count_for_tier(tier_id).await.unwrap(), 1);

    let orders = ledger.orders_for_buyer(&buyer).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].tier_name, "VIP");
}

#[tokio::test]
async fn insufficient_stock_leaves_no_trace() {
    let ledger = get_test_ledger().await;
    let (event_id, tier_id) = seed_event(&ledger, 2).await;

    let err = ledger
        .reserve(event_id, tier_id, &BuyerId::new("bob"), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientStock { .. }));

    let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
    assert_eq!(tier.available_stock, 2);
    assert_eq!(ledger.order_count_for_tier(tier_id).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_event_and_tier_are_distinguished() {
    let ledger = get_test_ledger().await;
    let (event_id, _) = seed_event(&ledger, 1).await;

    let err = ledger
        .reserve(EventId::new(), TierId::new(), &BuyerId::new("x"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::EventNotFound(_)));

    let err = ledger
        .reserve(event_id, TierId::new(), &BuyerId::new("x"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::TierNotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_reserves_never_oversell() {
    let ledger = get_test_ledger().await;
    let (event_id, tier_id) = seed_event(&ledger, 5).await;

    let mut handles = Vec::new();
    for i in 0..25 {
        let ledger = ledger.clone();
        let buyer = BuyerId::new(format!("buyer-{i}@example.com"));
        handles.push(tokio::spawn(async move {
            ledger.reserve(event_id, tier_id, &buyer, 1).await
        }));
    }

    let mut accepted = 0;
    let mut declined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::InsufficientStock { .. }) => declined += 1,
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    assert_eq!(accepted, 5);
    assert_eq!(declined, 20);

    let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
    assert_eq!(tier.available_stock, 0);
    assert_eq!(ledger.order_count_for_tier(tier_id).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn held_row_lock_surfaces_as_busy() {
    let info = get_container_info().await;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();
    sqlx::query("TRUNCATE TABLE orders, tiers, events")
        .execute(&pool)
        .await
        .unwrap();

    let ledger = PostgresLedger::with_lock_timeout(pool.clone(), Duration::from_millis(200));
    let (event_id, tier_id) = seed_event(&ledger, 3).await;

    // Hold the row lock from a separate transaction.
    let mut blocker = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM tiers WHERE id = $1 FOR UPDATE")
        .bind(tier_id.as_uuid())
        .fetch_one(&mut *blocker)
        .await
        .unwrap();

    let err = ledger
        .reserve(event_id, tier_id, &BuyerId::new("x"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::LockBusy(_)));

    blocker.rollback().await.unwrap();

    // The timed-out attempt left nothing behind; the tier is reservable.
    let tier = ledger.get_tier(tier_id).await.unwrap().unwrap();
    assert_eq!(tier.available_stock, 3);
    assert_eq!(ledger.order_count_for_tier(tier_id).await.unwrap(), 0);
    ledger
        .reserve(event_id, tier_id, &BuyerId::new("x"), 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn resync_is_idempotent() {
    let ledger = get_test_ledger().await;
    let (_, tier_id) = seed_event(&ledger, 10).await;

    let first = ledger.resync_stock(tier_id, 77).await.unwrap();
    let second = ledger.resync_stock(tier_id, 77).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.available_stock, 77);
}

#[tokio::test]
async fn delete_event_cascades_in_one_transaction() {
    let ledger = get_test_ledger().await;
    let (event_id, tier_id) = seed_event(&ledger, 5).await;
    ledger
        .reserve(event_id, tier_id, &BuyerId::new("x"), 2)
        .await
        .unwrap();

    ledger.delete_event(event_id).await.unwrap();

    assert!(ledger.get_event(event_id).await.unwrap().is_none());
    assert!(ledger.get_tier(tier_id).await.unwrap().is_none());
    assert!(ledger.orders_for_event(event_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn sales_totals_survive_an_empty_journal() {
    let ledger = get_test_ledger().await;

    let totals = ledger.sales_totals().await.unwrap();
    assert_eq!(totals.tickets_sold, 0);
    assert_eq!(totals.revenue.cents(), 0);

    let (event_id, tier_id) = seed_event(&ledger, 10).await;
    ledger
        .reserve(event_id, tier_id, &BuyerId::new("a"), 3)
        .await
        .unwrap();

    let totals = ledger.sales_totals().await.unwrap();
    assert_eq!(totals.tickets_sold, 3);
    assert_eq!(totals.revenue.cents(), 7500);
}

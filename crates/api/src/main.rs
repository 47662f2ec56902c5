//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::Config;
use cache::{InMemoryStockCache, RedisStockCache, StockCache};
use ledger::{InMemoryLedger, Ledger, OrderJournal, PostgresLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<L, C>(state: Arc<AppState<L, C>>, metrics_handle: PrometheusHandle, addr: String)
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    // Rebuild the cache from the ledger before taking traffic, so reads
    // do not start cold after a restart.
    state
        .engine
        .resync_all()
        .await
        .expect("initial cache resync failed");

    let app = api::create_app(state, metrics_handle);

    tracing::info!(%addr, "starting reservation API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick backends from the environment and run the server
    let config = Config::from_env();
    let addr = config.addr();

    match config.database_url {
        Some(ref database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(20)
                .connect(database_url)
                .await
                .expect("failed to connect to Postgres");
            let ledger = PostgresLedger::with_lock_timeout(pool, config.lock_timeout);
            ledger.run_migrations().await.expect("migrations failed");

            match config.redis_url {
                Some(ref redis_url) => {
                    let cache = RedisStockCache::new(redis_url)
                        .await
                        .expect("failed to connect to Redis");
                    serve(api::create_state(ledger, cache), metrics_handle, addr).await;
                }
                None => {
                    serve(
                        api::create_state(ledger, InMemoryStockCache::new()),
                        metrics_handle,
                        addr,
                    )
                    .await;
                }
            }
        }
        None => {
            tracing::warn!("DATABASE_URL not set, running with an in-memory ledger");
            serve(
                api::create_state(InMemoryLedger::new(), InMemoryStockCache::new()),
                metrics_handle,
                addr,
            )
            .await;
        }
    }
}

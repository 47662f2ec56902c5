//! HTTP API server for the reservation engine.
//!
//! Exposes the purchase, stock-count, live-feed, journal, and admin resync
//! operations over REST, with structured logging (tracing) and Prometheus
//! metrics. The live feed is served as SSE from the in-process broadcaster.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use cache::{InMemoryStockCache, StockCache};
use feed::TopicBroadcaster;
use ledger::{InMemoryLedger, Ledger, OrderJournal};
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::ReservationEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<L, C>
where
    L: Ledger + OrderJournal,
    C: StockCache,
{
    pub engine: ReservationEngine<L, C, TopicBroadcaster>,
    pub feed: TopicBroadcaster,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, C>(state: Arc<AppState<L, C>>, metrics_handle: PrometheusHandle) -> Router
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/stock/purchase", post(routes::stock::purchase::<L, C>))
        .route(
            "/stock/count/{event_id}/{tier_id}",
            get(routes::stock::count::<L, C>),
        )
        .route("/stock/live/{event_id}", get(routes::stock::live::<L, C>))
        .route(
            "/orders/buyer/{buyer_id}",
            get(routes::orders::for_buyer::<L, C>),
        )
        .route(
            "/orders/event/{event_id}",
            get(routes::orders::for_event::<L, C>),
        )
        .route("/admin/events", post(routes::admin::create_event::<L, C>))
        .route(
            "/admin/events/{event_id}",
            delete(routes::admin::delete_event::<L, C>),
        )
        .route(
            "/admin/stock/{event_id}/{tier_id}",
            put(routes::admin::resync_tier::<L, C>),
        )
        .route("/admin/stock/resync", post(routes::admin::resync_all::<L, C>))
        .route("/admin/stats", get(routes::admin::stats::<L, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over arbitrary ledger and cache backends.
///
/// The broadcaster is created here so the engine and the SSE routes share
/// the same topics.
pub fn create_state<L, C>(ledger: L, cache: C) -> Arc<AppState<L, C>>
where
    L: Ledger + OrderJournal,
    C: StockCache,
{
    let feed = TopicBroadcaster::new();
    Arc::new(AppState {
        engine: ReservationEngine::new(ledger, cache, feed.clone()),
        feed,
    })
}

/// Creates the default application state with in-memory backends.
pub fn create_default_state() -> Arc<AppState<InMemoryLedger, InMemoryStockCache>> {
    create_state(InMemoryLedger::new(), InMemoryStockCache::new())
}

//! Admin endpoints: event authoring, teardown, resync, and sales stats.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use cache::StockCache;
use common::{EventId, Money, TierId};
use ledger::{Ledger, NewTicketEvent, OrderJournal};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub tiers: Vec<TierRequest>,
}

#[derive(Deserialize)]
pub struct TierRequest {
    pub name: String,
    pub price_cents: i64,
    pub initial_stock: u32,
}

#[derive(Serialize)]
pub struct EventResponse {
    pub event_id: String,
    pub title: String,
    pub tiers: Vec<TierResponse>,
}

#[derive(Serialize)]
pub struct TierResponse {
    pub tier_id: String,
    pub name: String,
    pub price_cents: i64,
    pub available_stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct ResyncRequest {
    pub amount: u32,
}

#[derive(Serialize)]
pub struct ResyncResponse {
    pub remaining: u32,
}

#[derive(Serialize)]
pub struct ResyncAllResponse {
    pub synced: usize,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub tickets_sold: u64,
    pub revenue_cents: i64,
}

/// POST /admin/events — author an event with its pricing tiers.
#[tracing::instrument(skip(state, req))]
pub async fn create_event<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<EventResponse>), ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("event title is required".to_string()));
    }
    for tier in &req.tiers {
        if tier.name.trim().is_empty() {
            return Err(ApiError::BadRequest("tier name is required".to_string()));
        }
        if tier.price_cents < 0 {
            return Err(ApiError::BadRequest(
                "tier price cannot be negative".to_string(),
            ));
        }
    }

    let mut new_event = NewTicketEvent::new(req.title);
    for tier in req.tiers {
        new_event = new_event.with_tier(
            tier.name,
            Money::from_cents(tier.price_cents),
            tier.initial_stock,
        );
    }

    let (event, tiers) = state.engine.open_event(new_event).await?;

    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            event_id: event.id.to_string(),
            title: event.title,
            tiers: tiers
                .into_iter()
                .map(|t| TierResponse {
                    tier_id: t.id.to_string(),
                    name: t.name,
                    price_cents: t.price.cents(),
                    available_stock: t.available_stock,
                })
                .collect(),
        }),
    ))
}

/// DELETE /admin/events/:event_id — tear down an event, cascading to its
/// tiers, orders, and cache entries.
#[tracing::instrument(skip(state))]
pub async fn delete_event<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path(event_id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    state
        .engine
        .close_event(EventId::from_uuid(event_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/stock/:event_id/:tier_id — set a tier's stock to an absolute
/// value and force the cache to match the ledger.
#[tracing::instrument(skip(state))]
pub async fn resync_tier<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path((event_id, tier_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ResyncRequest>,
) -> Result<Json<ResyncResponse>, ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let remaining = state
        .engine
        .resync_tier(
            EventId::from_uuid(event_id),
            TierId::from_uuid(tier_id),
            req.amount,
        )
        .await?;
    Ok(Json(ResyncResponse { remaining }))
}

/// POST /admin/stock/resync — rewrite every cache entry from the ledger.
#[tracing::instrument(skip(state))]
pub async fn resync_all<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
) -> Result<Json<ResyncAllResponse>, ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let synced = state.engine.resync_all().await?;
    Ok(Json(ResyncAllResponse { synced }))
}

/// GET /admin/stats — aggregate tickets-sold and revenue figures.
#[tracing::instrument(skip(state))]
pub async fn stats<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
) -> Result<Json<StatsResponse>, ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let totals = state.engine.sales_totals().await?;
    Ok(Json(StatsResponse {
        tickets_sold: totals.tickets_sold,
        revenue_cents: totals.revenue.cents(),
    }))
}

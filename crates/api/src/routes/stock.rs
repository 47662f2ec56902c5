//! Purchase, stock count, and live feed endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use cache::StockCache;
use common::{BuyerId, EventId, TierId};
use ledger::{Ledger, OrderJournal};
use reservation::ReservationError;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct PurchaseRequest {
    pub event_id: Uuid,
    pub tier_id: Uuid,
    pub buyer_id: String,
    pub quantity: u32,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub remaining: u32,
}

/// POST /stock/purchase — the atomic purchase handshake.
#[tracing::instrument(skip(state, req))]
pub async fn purchase<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Json(req): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let buyer = BuyerId::new(req.buyer_id);
    let result = state
        .engine
        .reserve(
            EventId::from_uuid(req.event_id),
            TierId::from_uuid(req.tier_id),
            &buyer,
            req.quantity,
        )
        .await;

    match result {
        Ok(purchase) => Ok((
            StatusCode::CREATED,
            Json(PurchaseResponse {
                accepted: true,
                remaining: Some(purchase.remaining),
                order_id: Some(purchase.order.id.to_string()),
                reason: None,
            }),
        )),
        Err(ReservationError::InsufficientStock { available, .. }) => Ok((
            StatusCode::CONFLICT,
            Json(PurchaseResponse {
                accepted: false,
                remaining: Some(available),
                order_id: None,
                reason: Some("insufficient_stock"),
            }),
        )),
        Err(ReservationError::EventNotFound(_) | ReservationError::TierNotFound(_)) => Ok((
            StatusCode::NOT_FOUND,
            Json(PurchaseResponse {
                accepted: false,
                remaining: None,
                order_id: None,
                reason: Some("not_found"),
            }),
        )),
        Err(ReservationError::Busy(_)) => Ok((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(PurchaseResponse {
                accepted: false,
                remaining: None,
                order_id: None,
                reason: Some("busy"),
            }),
        )),
        Err(err) => Err(ApiError::from(err)),
    }
}

/// GET /stock/count/:event_id/:tier_id — cache-first remaining count.
#[tracing::instrument(skip(state))]
pub async fn count<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path((event_id, tier_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CountResponse>, ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let remaining = state
        .engine
        .remaining(EventId::from_uuid(event_id), TierId::from_uuid(tier_id))
        .await?;
    Ok(Json(CountResponse { remaining }))
}

/// GET /stock/live/:event_id — SSE stream of the event's stock topic.
///
/// Each message carries `{tierId, remaining}`. Subscribers that lag past
/// the topic buffer silently miss updates; the feed is advisory.
#[tracing::instrument(skip(state))]
pub async fn live<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path(event_id): Path<Uuid>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let rx = state.feed.subscribe(EventId::from_uuid(event_id)).await;

    let stream = BroadcastStream::new(rx).filter_map(|update| match update {
        Ok(update) => serde_json::to_string(&update)
            .ok()
            .map(|data| Ok(Event::default().event("stock").data(data))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!(skipped, "live feed subscriber lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

//! Order journal endpoints for buyer history and event reporting.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use cache::StockCache;
use common::{BuyerId, EventId};
use ledger::{Ledger, Order, OrderJournal};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub buyer_id: String,
    pub event_id: String,
    pub tier_id: String,
    pub tier_name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub total_cents: i64,
    pub created_at: String,
}

fn to_response(order: &Order) -> OrderResponse {
    OrderResponse {
        order_id: order.id.to_string(),
        buyer_id: order.buyer.to_string(),
        event_id: order.event_id.to_string(),
        tier_id: order.tier_id.to_string(),
        tier_name: order.tier_name.clone(),
        unit_price_cents: order.unit_price.cents(),
        quantity: order.quantity,
        total_cents: order.total_amount.cents(),
        created_at: order.created_at.to_rfc3339(),
    }
}

/// GET /orders/buyer/:buyer_id — a buyer's purchase history.
#[tracing::instrument(skip(state))]
pub async fn for_buyer<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path(buyer_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let buyer = BuyerId::new(buyer_id);
    let orders = state.engine.orders_for_buyer(&buyer).await?;
    Ok(Json(orders.iter().map(to_response).collect()))
}

/// GET /orders/event/:event_id — all orders committed against an event.
#[tracing::instrument(skip(state))]
pub async fn for_event<L, C>(
    State(state): State<Arc<AppState<L, C>>>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    L: Ledger + OrderJournal + 'static,
    C: StockCache + 'static,
{
    let orders = state
        .engine
        .orders_for_event(EventId::from_uuid(event_id))
        .await?;
    Ok(Json(orders.iter().map(to_response).collect()))
}

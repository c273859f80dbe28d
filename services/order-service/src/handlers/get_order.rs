use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use domain::{Order, OrderLineItem};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use super::{error_response, user_id, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLineItem>,
}

/// A single order with its line-item snapshots, scoped to the acting
/// user
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetails>, (StatusCode, Json<ErrorResponse>)> {
    let (order, items) = state
        .saga
        .get_order(user_id(&headers), order_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch order {}: {}", order_id, e);
            error_response(e)
        })?;

    Ok(Json(OrderDetails { order, items }))
}

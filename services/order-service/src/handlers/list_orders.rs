use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use domain::Order;
use tracing::error;

use super::{error_response, user_id, ErrorResponse};
use crate::state::AppState;

/// All orders of the acting user, newest first
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Order>>, (StatusCode, Json<ErrorResponse>)> {
    let orders = state
        .saga
        .get_orders(user_id(&headers))
        .await
        .map_err(|e| {
            error!("Failed to list orders: {}", e);
            error_response(e)
        })?;

    Ok(Json(orders))
}

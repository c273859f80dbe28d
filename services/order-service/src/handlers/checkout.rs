use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use domain::Order;
use tracing::{error, info};

use super::{error_response, session_id, user_id, ErrorResponse};
use crate::state::AppState;

/// Run the checkout saga for the acting user's cart. On success the
/// order comes back PAID; every failure mode maps to a distinct status
/// code so the client can react accordingly.
pub async fn handle(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<Order>), (StatusCode, Json<ErrorResponse>)> {
    let user = user_id(&headers);
    let session = session_id(&headers)?;

    info!(?user, %session, "Checkout requested");

    let order = state.saga.buy(user, &session).await.map_err(|e| {
        error!("Checkout failed: {}", e);
        error_response(e)
    })?;

    Ok((StatusCode::CREATED, Json(order)))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::Payment;
use tracing::error;
use uuid::Uuid;

use super::{error_response, ErrorResponse};
use crate::state::AppState;

/// Cancel a PENDING payment; any other state is rejected with 409
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, (StatusCode, Json<ErrorResponse>)> {
    let payment = state.processor.cancel(id).await.map_err(|e| {
        error!("Failed to cancel payment {}: {}", id, e);
        error_response(e)
    })?;

    Ok(Json(payment))
}

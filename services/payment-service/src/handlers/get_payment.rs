use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::Payment;
use uuid::Uuid;

use super::{error_response, ErrorResponse};
use crate::state::AppState;

/// Fetch a single payment by id
pub async fn handle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, (StatusCode, Json<ErrorResponse>)> {
    let payment = state.processor.get(id).await.map_err(error_response)?;
    Ok(Json(payment))
}

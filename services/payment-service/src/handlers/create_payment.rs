use axum::{extract::State, http::StatusCode, Json};
use domain::Payment;
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use super::{error_response, ErrorResponse};
use crate::error::PaymentApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    #[validate(range(min = 0.01))]
    pub amount: f64,
    #[serde(default)]
    pub description: String,
}

/// Handle payment creation: records the attempt and runs the balance
/// deduction synchronously. A deduction failure still returns 201; the
/// payment body carries FAILED and the reason.
pub async fn handle(
    State(state): State<AppState>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), (StatusCode, Json<ErrorResponse>)> {
    info!(
        "Received payment request for order {} by user {}",
        req.order_id, req.user_id
    );

    if let Err(e) = req.validate() {
        error!("Validation error: {}", e);
        return Err(error_response(PaymentApiError::Validation(e.to_string())));
    }

    let payment = state
        .processor
        .create(req.order_id, req.user_id, req.amount, req.description)
        .await
        .map_err(|e| {
            error!("Failed to create payment: {}", e);
            error_response(e)
        })?;

    Ok((StatusCode::CREATED, Json(payment)))
}

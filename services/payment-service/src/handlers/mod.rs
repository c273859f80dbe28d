pub mod cancel_payment;
pub mod create_payment;
pub mod get_balance;
pub mod get_payment;
pub mod health;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::error::PaymentApiError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map service errors onto HTTP responses
pub fn error_response(err: PaymentApiError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        PaymentApiError::NotFound(_) | PaymentApiError::UserNotFound(_) => StatusCode::NOT_FOUND,
        PaymentApiError::InvalidOperation(_) => StatusCode::CONFLICT,
        PaymentApiError::Validation(_) | PaymentApiError::Domain(_) => StatusCode::BAD_REQUEST,
        PaymentApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

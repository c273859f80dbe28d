pub mod cart;
pub mod checkout;
pub mod get_order;
pub mod health;
pub mod items;
pub mod list_orders;

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::CheckoutError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map checkout errors onto HTTP responses
pub fn error_response(err: CheckoutError) -> (StatusCode, Json<ErrorResponse>) {
    (
        err.status_code(),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Acting user, forwarded by the edge as `X-User-Id`. Absent or
/// malformed means the request is anonymous.
pub fn user_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
}

/// Session identity carried in `X-Session-Id`; the cart is keyed by it,
/// so every cart-touching endpoint requires one.
pub fn session_id(headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    headers
        .get("X-Session-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing X-Session-Id header".to_string(),
                }),
            )
        })
}

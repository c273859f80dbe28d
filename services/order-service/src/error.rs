use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

/// Checkout failure taxonomy. Variants are deliberately distinguishable
/// at the API boundary so the UI can tell "try later"
/// (ServiceUnavailable) from "add funds" (InsufficientBalance) from
/// "something went wrong" (PaymentFailed).
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("User could not be resolved")]
    UserNotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment service is unavailable")]
    ServiceUnavailable,

    #[error("Order belongs to another user")]
    AccessDenied,

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] domain::OrderError),
}

impl CheckoutError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckoutError::UserNotFound => StatusCode::UNAUTHORIZED,
            CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
            CheckoutError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
            CheckoutError::PaymentFailed(_) => StatusCode::BAD_GATEWAY,
            CheckoutError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            CheckoutError::AccessDenied => StatusCode::FORBIDDEN,
            CheckoutError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            CheckoutError::SessionStore(_)
            | CheckoutError::Database(_)
            | CheckoutError::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PaymentApiError {
    #[error("Payment not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] domain::PaymentError),
}

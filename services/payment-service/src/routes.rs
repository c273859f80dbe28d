use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{cancel_payment, create_payment, get_balance, get_payment, health};
use crate::state::AppState;

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/payments", post(create_payment::handle))
        .route("/api/v1/payments/:id", get(get_payment::handle))
        .route("/api/v1/payments/:id/cancel", post(cancel_payment::handle))
        .route("/api/v1/users/:id/balance", get(get_balance::handle))
        .with_state(state)
}

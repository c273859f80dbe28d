use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{cart, checkout, get_order, health, items, list_orders};
use crate::state::AppState;

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/checkout", post(checkout::handle))
        .route("/api/v1/orders", get(list_orders::handle))
        .route("/api/v1/orders/:id", get(get_order::handle))
        .route("/api/v1/cart", get(cart::view))
        .route("/api/v1/cart/items", post(cart::add))
        .route("/api/v1/cart/items/:id", delete(cart::remove))
        .route("/api/v1/items", get(items::list))
        .route("/api/v1/items/:id", get(items::get))
        .route("/api/v1/items/:id/image", get(items::image))
        .with_state(state)
}

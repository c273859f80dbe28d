use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;
use validator::Validate;

use super::{error_response, session_id, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub title: String,
    pub unit_price: f64,
    pub count: i64,
    pub subtotal: f64,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub item_id: Uuid,
    #[validate(range(min = 1))]
    pub count: i64,
}

/// Priced view of the session cart. Prices come from the catalog at
/// read time; entries whose item has vanished are not shown.
pub async fn view(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CartView>, (StatusCode, Json<ErrorResponse>)> {
    let session = session_id(&headers)?;

    let entries = state
        .cart
        .read_all(&session)
        .await
        .map_err(error_response)?;

    let mut items = Vec::new();
    let mut total = 0.0;
    for entry in entries.into_iter().filter(|e| e.is_orderable()) {
        if let Some(item) = state
            .catalog
            .find_by_id(entry.item_id)
            .await
            .map_err(error_response)?
        {
            let subtotal = item.price * entry.count as f64;
            total += subtotal;
            items.push(CartLine {
                item_id: item.id,
                title: item.title,
                unit_price: item.price,
                count: entry.count,
                subtotal,
            });
        }
    }

    Ok(Json(CartView { items, total }))
}

/// Add an item to the session cart. The item must exist in the catalog;
/// counts accumulate.
pub async fn add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AddToCartRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let session = session_id(&headers)?;

    if let Err(e) = req.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        ));
    }

    let known = state
        .catalog
        .find_by_id(req.item_id)
        .await
        .map_err(error_response)?
        .is_some();
    if !known {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Item not found: {}", req.item_id),
            }),
        ));
    }

    state
        .cart
        .add(&session, req.item_id, req.count)
        .await
        .map_err(|e| {
            error!("Failed to add to cart: {}", e);
            error_response(e)
        })?;

    debug!(%session, item_id = %req.item_id, count = req.count, "Cart updated");
    Ok(StatusCode::NO_CONTENT)
}

/// Drop an item from the session cart entirely
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let session = session_id(&headers)?;

    state
        .cart
        .remove(&session, item_id)
        .await
        .map_err(|e| {
            error!("Failed to remove from cart: {}", e);
            error_response(e)
        })?;

    Ok(StatusCode::NO_CONTENT)
}

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::{Item, ItemPage, ItemQuery, SortBy};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use super::{error_response, ErrorResponse};
use crate::state::AppState;

const MAX_PAGE_SIZE: u32 = 100;

fn default_size() -> u32 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListItemsQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortBy,
    #[serde(default)]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

/// Paged catalog listing with optional title search and sorting
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListItemsQuery>,
) -> Result<Json<ItemPage>, (StatusCode, Json<ErrorResponse>)> {
    let query = ItemQuery::new(
        params.search.filter(|s| !s.is_empty()),
        params.sort,
        params.page,
        params.size.clamp(1, MAX_PAGE_SIZE),
    );

    let page = state.catalog.find_page(&query).await.map_err(|e| {
        error!("Failed to list items: {}", e);
        error_response(e)
    })?;

    Ok(Json(page))
}

/// Single catalog item
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, (StatusCode, Json<ErrorResponse>)> {
    let item = state
        .catalog
        .find_by_id(id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Item not found: {}", id),
                }),
            )
        })?;

    Ok(Json(item))
}

/// Item image bytes, served as JPEG
pub async fn image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let bytes = state
        .catalog
        .find_image(id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("No image for item: {}", id),
                }),
            )
        })?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

//! Book search handler.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::envelope::{BooksData, Envelope};
use crate::errors::ApiError;
use crate::handlers::book::attach_creators;
use crate::pagination;
use crate::AppState;

/// `GET /search` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `GET /search` -- Find books whose title or author contains the
/// query, case-insensitively.
#[utoipa::path(
    get,
    path = "/search",
    tag = "Search",
    operation_id = "SearchBooks",
    params(
        ("query" = String, Query, description = "Substring to match against title and author"),
        ("page" = Option<u32>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u32>, Query, description = "Page size (default 10, max 100)")
    ),
    responses(
        (status = 200, description = "Paged search results"),
        (status = 400, description = "Missing query parameter")
    )
)]
pub async fn search_books(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;

    // Absent and empty both count as missing.
    let query = match params.query.as_deref() {
        Some(q) if !q.is_empty() => q,
        _ => return Err(ApiError::MissingQuery),
    };
    let window = pagination::window(params.page, params.limit);

    let listing = state
        .catalog
        .search_books(query, window.offset(), window.limit)
        .await?;

    let books = attach_creators(&state, listing.books).await?;
    let count = books.len() as u64;
    let body = Envelope::page(BooksData { books }, count, window.meta(listing.total));
    Ok((StatusCode::OK, Json(body)).into_response())
}

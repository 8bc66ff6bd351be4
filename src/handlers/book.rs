//! Book catalog handlers: create, list, detail.
//!
//! Books are append-only: there is no update or delete route, so a
//! review always points at a live book.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{Datelike, Utc};
use garde::Validate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::catalog::store::{BookFilter, BookRecord};
use crate::envelope::{
    BookData, BookDetail, BookView, BooksData, Envelope, ReviewListing, UserRef,
};
use crate::errors::ApiError;
use crate::handlers::review::attach_review_authors;
use crate::pagination;
use crate::AppState;

// -- Request shapes -----------------------------------------------------------

/// `POST /books` request body.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    #[garde(length(min = 1, max = 200))]
    pub title: String,
    #[garde(length(min = 1, max = 100))]
    pub author: String,
    #[garde(length(min = 1))]
    pub genre: String,
    #[garde(custom(year_not_in_future))]
    pub published_year: i32,
    #[garde(length(min = 1, max = 2000))]
    pub description: String,
}

/// `GET /books` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListBooksParams {
    pub author: Option<String>,
    pub genre: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Bare `page`/`limit` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Published year must be positive and no later than the current year.
fn year_not_in_future(value: &i32, _ctx: &()) -> garde::Result {
    let current = Utc::now().year();
    if *value < 1 || *value > current {
        return Err(garde::Error::new(format!("must be between 1 and {current}")));
    }
    Ok(())
}

/// Round a mean rating to one decimal place; `0` when there are no
/// ratings.
fn round_rating(avg: Option<f64>) -> f64 {
    match avg {
        Some(value) => (value * 10.0).round() / 10.0,
        None => 0.0,
    }
}

/// Resolve each book's creator to a `{id, username}` ref, one store
/// lookup per distinct creator. A creator that no longer exists yields
/// `None` rather than failing the listing.
pub(crate) async fn attach_creators(
    state: &AppState,
    records: Vec<BookRecord>,
) -> Result<Vec<BookView>, ApiError> {
    let mut creators: HashMap<String, Option<UserRef>> = HashMap::new();
    let mut views = Vec::with_capacity(records.len());
    for record in records {
        if !creators.contains_key(&record.created_by) {
            let found = state
                .catalog
                .get_user(&record.created_by)
                .await?
                .map(UserRef::from);
            creators.insert(record.created_by.clone(), found);
        }
        let creator = creators.get(&record.created_by).cloned().flatten();
        views.push(BookView::from_record(record, creator));
    }
    Ok(views)
}

// -- Handlers -----------------------------------------------------------------

/// `POST /books` -- Add a book to the catalog. Requires auth.
#[utoipa::path(
    post,
    path = "/books",
    tag = "Book",
    operation_id = "CreateBook",
    responses(
        (status = 201, description = "Book created"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn create_book(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateBookRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let record = BookRecord {
        id: Uuid::new_v4().to_string(),
        title: req.title,
        author: req.author,
        genre: req.genre,
        published_year: req.published_year,
        description: req.description,
        created_by: user.id.clone(),
        created_at: Utc::now(),
    };
    state.catalog.insert_book(record.clone()).await?;

    let view = BookView::from_record(record, Some(UserRef::from(user)));
    let body = Envelope::data(BookData { book: view });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `GET /books` -- List books, newest first, with optional filters.
#[utoipa::path(
    get,
    path = "/books",
    tag = "Book",
    operation_id = "ListBooks",
    params(
        ("author" = Option<String>, Query, description = "Case-insensitive author substring filter"),
        ("genre" = Option<String>, Query, description = "Case-insensitive genre substring filter"),
        ("page" = Option<u32>, Query, description = "Page number (default 1)"),
        ("limit" = Option<u32>, Query, description = "Page size (default 10, max 100)")
    ),
    responses(
        (status = 200, description = "Paged book list"),
        (status = 400, description = "Malformed query parameters")
    )
)]
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListBooksParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let window = pagination::window(params.page, params.limit);
    let filter = BookFilter {
        author: params.author,
        genre: params.genre,
    };

    let listing = state
        .catalog
        .list_books(&filter, window.offset(), window.limit)
        .await?;

    let books = attach_creators(&state, listing.books).await?;
    let count = books.len() as u64;
    let body = Envelope::page(BooksData { books }, count, window.meta(listing.total));
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// `GET /books/:id` -- Book detail with a page of reviews and the
/// average rating.
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "Book",
    operation_id = "GetBook",
    params(
        ("id" = String, Path, description = "Book id"),
        ("page" = Option<u32>, Query, description = "Review page number (default 1)"),
        ("limit" = Option<u32>, Query, description = "Review page size (default 10, max 100)")
    ),
    responses(
        (status = 200, description = "Book detail"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params?;
    let window = pagination::window(params.page, params.limit);

    let book = state
        .catalog
        .get_book(&id)
        .await?
        .ok_or(ApiError::NotFound { resource: "Book" })?;

    let creator = state
        .catalog
        .get_user(&book.created_by)
        .await?
        .map(UserRef::from);
    let book_view = BookView::from_record(book, creator);

    let listing = state
        .catalog
        .list_reviews_for_book(&id, window.offset(), window.limit)
        .await?;
    let items = attach_review_authors(&state, listing.reviews).await?;

    // Averaged over every review of the book, not just this page.
    let average_rating = round_rating(state.catalog.average_rating(&id).await?);

    let count = items.len() as u64;
    let body = Envelope::data(BookDetail {
        book: book_view,
        reviews: ReviewListing {
            items,
            count,
            pagination: window.meta(listing.total),
        },
        average_rating,
    });
    Ok((StatusCode::OK, Json(body)).into_response())
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_book_request() -> CreateBookRequest {
        CreateBookRequest {
            title: "A Wizard of Earthsea".to_string(),
            author: "Ursula K. Le Guin".to_string(),
            genre: "Fantasy".to_string(),
            published_year: 1968,
            description: "A young wizard learns the cost of power.".to_string(),
        }
    }

    #[test]
    fn test_create_book_request_valid() {
        assert!(make_book_request().validate().is_ok());
    }

    #[test]
    fn test_title_bounds() {
        let mut req = make_book_request();
        req.title = "a".repeat(200);
        assert!(req.validate().is_ok());
        req.title = "a".repeat(201);
        assert!(req.validate().is_err());
        req.title = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_author_and_genre_bounds() {
        let mut req = make_book_request();
        req.author = "a".repeat(101);
        assert!(req.validate().is_err());

        let mut req = make_book_request();
        req.genre = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_description_bounds() {
        let mut req = make_book_request();
        req.description = "d".repeat(2000);
        assert!(req.validate().is_ok());
        req.description = "d".repeat(2001);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_published_year_range() {
        let current = Utc::now().year();
        let mut req = make_book_request();

        req.published_year = current;
        assert!(req.validate().is_ok());
        req.published_year = 1;
        assert!(req.validate().is_ok());

        req.published_year = current + 1;
        assert!(req.validate().is_err());
        req.published_year = 0;
        assert!(req.validate().is_err());
        req.published_year = -500;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_round_rating() {
        assert_eq!(round_rating(None), 0.0);
        assert_eq!(round_rating(Some(4.0)), 4.0);
        assert_eq!(round_rating(Some(13.0 / 3.0)), 4.3);
        assert_eq!(round_rating(Some(11.0 / 3.0)), 3.7);
        assert_eq!(round_rating(Some(4.25)), 4.3);
    }
}

//! Review handlers: create, update, delete.
//!
//! Every mutation requires auth; update and delete additionally
//! require ownership. One review per (book, user) pair.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use garde::Validate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::catalog::store::{ReviewRecord, StoreError};
use crate::envelope::{Envelope, ReviewData, ReviewView, UserRef};
use crate::errors::ApiError;
use crate::AppState;

// -- Request bodies -----------------------------------------------------------

/// `POST /books/:id/reviews` request body.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateReviewRequest {
    #[garde(length(min = 1, max = 1000))]
    pub text: String,
    #[garde(range(min = 1, max = 5))]
    pub rating: u32,
}

/// `PUT /reviews/:id` request body. Absent fields keep their stored
/// values.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateReviewRequest {
    #[garde(length(min = 1, max = 1000))]
    pub text: Option<String>,
    #[garde(range(min = 1, max = 5))]
    pub rating: Option<u32>,
}

/// Resolve each review's author to a `{id, username}` ref, one store
/// lookup per distinct author. An author that no longer exists yields
/// `None` rather than failing the listing.
pub(crate) async fn attach_review_authors(
    state: &AppState,
    records: Vec<ReviewRecord>,
) -> Result<Vec<ReviewView>, ApiError> {
    let mut authors: HashMap<String, Option<UserRef>> = HashMap::new();
    let mut views = Vec::with_capacity(records.len());
    for record in records {
        if !authors.contains_key(&record.user_id) {
            let found = state
                .catalog
                .get_user(&record.user_id)
                .await?
                .map(UserRef::from);
            authors.insert(record.user_id.clone(), found);
        }
        let author = authors.get(&record.user_id).cloned().flatten();
        views.push(ReviewView::from_record(record, author));
    }
    Ok(views)
}

// -- Handlers -----------------------------------------------------------------

/// `POST /books/:id/reviews` -- Review a book. Requires auth; one
/// review per user per book.
#[utoipa::path(
    post,
    path = "/books/{id}/reviews",
    tag = "Review",
    operation_id = "CreateReview",
    params(("id" = String, Path, description = "Book id")),
    responses(
        (status = 201, description = "Review created"),
        (status = 400, description = "Validation failure or duplicate review"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    if state.catalog.get_book(&id).await?.is_none() {
        return Err(ApiError::NotFound { resource: "Book" });
    }

    // Friendly pre-check; the (book, user) unique constraint is the
    // race-safe backstop.
    if state
        .catalog
        .find_review_by_book_and_user(&id, &user.id)
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateReview);
    }

    let now = Utc::now();
    let record = ReviewRecord {
        id: Uuid::new_v4().to_string(),
        text: req.text,
        rating: req.rating,
        book_id: id,
        user_id: user.id.clone(),
        created_at: now,
        updated_at: now,
    };
    match state.catalog.insert_review(record.clone()).await {
        Ok(()) => {}
        Err(StoreError::UniqueViolation) => return Err(ApiError::DuplicateReview),
        Err(err) => return Err(err.into()),
    }

    let view = ReviewView::from_record(record, Some(UserRef::from(user)));
    let body = Envelope::data(ReviewData { review: view });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `PUT /reviews/:id` -- Edit your own review.
#[utoipa::path(
    put,
    path = "/reviews/{id}",
    tag = "Review",
    operation_id = "UpdateReview",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review updated"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not the review's author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn update_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateReviewRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let mut review = state
        .catalog
        .get_review(&id)
        .await?
        .ok_or(ApiError::NotFound { resource: "Review" })?;

    if review.user_id != user.id {
        return Err(ApiError::Forbidden {
            message: "You can only update your own reviews",
        });
    }

    if let Some(text) = req.text {
        review.text = text;
    }
    if let Some(rating) = req.rating {
        review.rating = rating;
    }
    review.updated_at = Utc::now();

    state
        .catalog
        .update_review(&review.id, &review.text, review.rating, review.updated_at)
        .await?;

    let view = ReviewView::from_record(review, Some(UserRef::from(user)));
    let body = Envelope::data(ReviewData { review: view });
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// `DELETE /reviews/:id` -- Delete your own review.
#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "Review",
    operation_id = "DeleteReview",
    params(("id" = String, Path, description = "Review id")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not the review's author"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let review = state
        .catalog
        .get_review(&id)
        .await?
        .ok_or(ApiError::NotFound { resource: "Review" })?;

    if review.user_id != user.id {
        return Err(ApiError::Forbidden {
            message: "You can only delete your own reviews",
        });
    }

    state.catalog.delete_review(&review.id).await?;

    let body = Envelope::deleted("Review deleted successfully");
    Ok((StatusCode::OK, Json(body)).into_response())
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_review_request_bounds() {
        let valid = CreateReviewRequest {
            text: "Loved it".to_string(),
            rating: 5,
        };
        assert!(valid.validate().is_ok());

        let long_text = CreateReviewRequest {
            text: "x".repeat(1000),
            rating: 1,
        };
        assert!(long_text.validate().is_ok());

        let too_long = CreateReviewRequest {
            text: "x".repeat(1001),
            rating: 3,
        };
        assert!(too_long.validate().is_err());

        let empty = CreateReviewRequest {
            text: String::new(),
            rating: 3,
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_create_review_rating_range() {
        for rating in 1..=5 {
            let req = CreateReviewRequest {
                text: "ok".to_string(),
                rating,
            };
            assert!(req.validate().is_ok(), "rating {rating} should pass");
        }
        for rating in [0, 6, 100] {
            let req = CreateReviewRequest {
                text: "ok".to_string(),
                rating,
            };
            assert!(req.validate().is_err(), "rating {rating} should fail");
        }
    }

    #[test]
    fn test_update_review_request_partial() {
        let empty = UpdateReviewRequest {
            text: None,
            rating: None,
        };
        assert!(empty.validate().is_ok());

        let rating_only = UpdateReviewRequest {
            text: None,
            rating: Some(4),
        };
        assert!(rating_only.validate().is_ok());

        let bad_rating = UpdateReviewRequest {
            text: None,
            rating: Some(9),
        };
        assert!(bad_rating.validate().is_err());

        let bad_text = UpdateReviewRequest {
            text: Some(String::new()),
            rating: None,
        };
        assert!(bad_text.validate().is_err());
    }
}

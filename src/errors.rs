//! API error types.
//!
//! Every failure a handler can produce maps to one variant here.  The
//! enum implements [`axum::response::IntoResponse`] so handlers can
//! simply return `Err(ApiError::NotFound { .. })` and the client gets
//! the uniform `{success: false, error}` envelope.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::catalog::store::StoreError;
use crate::envelope::Envelope;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// API failure modes expressed as a Rust enum.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request body or query parameter failed validation.
    #[error("{message}")]
    Validation { message: String },

    /// Signup hit an email or username that is already registered.
    #[error("User with this email or username already exists")]
    DuplicateIdentity,

    /// The (book, user) pair already has a review.
    #[error("You have already reviewed this book")]
    DuplicateReview,

    /// Search was called without a usable `query` parameter.
    #[error("Search query is required")]
    MissingQuery,

    /// Login failed. One message for every cause, so a caller cannot
    /// probe which emails are registered.
    #[error("Incorrect email or password")]
    InvalidCredentials,

    /// Protected route hit without a bearer token.
    #[error("You are not logged in. Please log in to get access")]
    MissingToken,

    /// The bearer token failed signature or shape checks.
    #[error("Invalid token. Please log in again")]
    InvalidToken,

    /// The bearer token is past its expiry.
    #[error("Your token has expired. Please log in again")]
    ExpiredToken,

    /// The token verified but its user no longer exists.
    #[error("The user belonging to this token no longer exists")]
    UserNotFound,

    /// Authenticated, but not the owner of the resource.
    #[error("{message}")]
    Forbidden { message: &'static str },

    /// The requested resource does not exist.
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// Catch-all for unexpected internal errors. The cause is logged;
    /// the response body stays generic.
    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::DuplicateIdentity => StatusCode::BAD_REQUEST,
            ApiError::DuplicateReview => StatusCode::BAD_REQUEST,
            ApiError::MissingQuery => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::ExpiredToken => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<garde::Report> for ApiError {
    fn from(report: garde::Report) -> Self {
        let message = report
            .iter()
            .map(|(path, error)| format!("{path}: {error}"))
            .collect::<Vec<_>>()
            .join(", ");
        ApiError::Validation { message }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            // Insert call sites match UniqueViolation before `?`
            // propagates; one that reaches here is a bug and surfaces
            // as a 500.
            StoreError::UniqueViolation => {
                ApiError::Internal(anyhow::anyhow!("unhandled unique-constraint violation"))
            }
            StoreError::Internal(err) => ApiError::Internal(err),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation {
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());

        if let ApiError::Internal(ref cause) = self {
            tracing::error!(request_id = %request_id, error = ?cause, "internal error");
        }

        let body = Envelope::error(self.to_string());

        (
            status,
            [
                ("x-request-id", request_id),
                ("date", date),
                ("server", "ShelfStore".to_string()),
            ],
            Json(body),
        )
            .into_response()
    }
}

// -- Tests --------------------------------------------------------------------

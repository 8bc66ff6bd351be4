//! Signup and login handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use garde::Validate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth;
use crate::catalog::store::{StoreError, UserRecord};
use crate::envelope::{Envelope, UserData, UserView};
use crate::errors::ApiError;
use crate::AppState;

// -- Request bodies -----------------------------------------------------------

/// `POST /signup` request body.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SignupRequest {
    #[garde(length(min = 3, max = 30))]
    pub username: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 6))]
    pub password: String,
}

/// `POST /login` request body.
///
/// Fields stay optional on purpose: a missing email or password folds
/// into the same `InvalidCredentials` failure as a wrong one.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

// -- Handlers -----------------------------------------------------------------

/// `POST /signup` -- Register a user and issue a session token.
#[utoipa::path(
    post,
    path = "/signup",
    tag = "Auth",
    operation_id = "Signup",
    responses(
        (status = 201, description = "User created, token issued"),
        (status = 400, description = "Validation failure or duplicate identity")
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    // Combined pre-check for a friendly failure; the store's unique
    // constraints are the race-safe backstop below.
    if state
        .catalog
        .identity_taken(&req.email, &req.username)
        .await?
    {
        return Err(ApiError::DuplicateIdentity);
    }

    let password_hash = auth::hash_password(&req.password, state.config.auth.bcrypt_cost)?;
    let record = UserRecord {
        id: Uuid::new_v4().to_string(),
        username: req.username,
        email: req.email,
        password_hash,
        created_at: Utc::now(),
    };

    match state.catalog.insert_user(record.clone()).await {
        Ok(()) => {}
        Err(StoreError::UniqueViolation) => return Err(ApiError::DuplicateIdentity),
        Err(err) => return Err(err.into()),
    }

    let token = auth::issue_token(
        &record.id,
        &state.config.auth.token_secret,
        state.config.auth.token_ttl_seconds,
    )?;

    let body = Envelope::data_with_token(
        UserData {
            user: UserView::from(record),
        },
        token,
    );
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `POST /login` -- Verify credentials and issue a session token.
#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "Login",
    responses(
        (status = 200, description = "Credentials accepted, token issued"),
        (status = 401, description = "Credentials rejected")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;

    let (email, password) = match (req.email, req.password) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(ApiError::InvalidCredentials),
    };

    let user = state
        .catalog
        .find_user_by_email(&email)
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !auth::verify_password(&password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::issue_token(
        &user.id,
        &state.config.auth.token_secret,
        state.config.auth.token_ttl_seconds,
    )?;

    let body = Envelope::data_with_token(
        UserData {
            user: UserView::from(user),
        },
        token,
    );
    Ok((StatusCode::OK, Json(body)).into_response())
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_signup(username: &str, email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_signup_valid() {
        assert!(make_signup("alice", "alice@example.com", "hunter22")
            .validate()
            .is_ok());
        // Boundary lengths.
        assert!(make_signup("abc", "a@b.co", "sixsix").validate().is_ok());
        assert!(make_signup(&"a".repeat(30), "a@b.co", "sixsix")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_signup_username_bounds() {
        assert!(make_signup("ab", "a@b.co", "hunter22").validate().is_err());
        assert!(make_signup(&"a".repeat(31), "a@b.co", "hunter22")
            .validate()
            .is_err());
    }

    #[test]
    fn test_signup_email_format() {
        assert!(make_signup("alice", "not-an-email", "hunter22")
            .validate()
            .is_err());
        assert!(make_signup("alice", "", "hunter22").validate().is_err());
    }

    #[test]
    fn test_signup_password_min_length() {
        assert!(make_signup("alice", "a@b.co", "short").validate().is_err());
        assert!(make_signup("alice", "a@b.co", "longer").validate().is_ok());
    }
}

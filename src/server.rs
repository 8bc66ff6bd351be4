//! Axum router construction and API route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns
//! a ready-to-serve [`axum::Router`]. Authentication is a middleware
//! concern: [`auth_middleware`] guards the protected method+path shapes
//! and attaches the resolved [`AuthUser`] to request extensions, so
//! handlers just pull the identity they need.

use axum::{
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth::{self, AuthUser, TokenError};
use crate::errors::{generate_request_id, ApiError};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI specification ----------------------------------------------------

/// OpenAPI documentation for the ShelfStore API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ShelfStore API",
        version = "0.1.0",
        description = "Book review catalog REST API server"
    ),
    paths(
        // Service endpoints
        health_check,
        welcome,
        // Auth
        crate::handlers::auth::signup,
        crate::handlers::auth::login,
        // Books
        crate::handlers::book::create_book,
        crate::handlers::book::list_books,
        crate::handlers::book::get_book,
        // Reviews
        crate::handlers::review::create_review,
        crate::handlers::review::update_review,
        crate::handlers::review::delete_review,
        // Search
        crate::handlers::search::search_books,
    ),
    tags(
        (name = "Health", description = "Service endpoints"),
        (name = "Auth", description = "Signup and login"),
        (name = "Book", description = "Book catalog operations"),
        (name = "Review", description = "Review operations"),
        (name = "Search", description = "Book search"),
    )
)]
struct ApiDoc;

/// Build the axum [`Router`] with all API routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Service endpoints.
        .route("/", get(welcome))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_spec))
        // Auth.
        .route("/signup", post(crate::handlers::auth::signup))
        .route("/login", post(crate::handlers::auth::login))
        // Books.
        .route(
            "/books",
            get(crate::handlers::book::list_books).post(crate::handlers::book::create_book),
        )
        .route("/books/:id", get(crate::handlers::book::get_book))
        // Reviews.
        .route(
            "/books/:id/reviews",
            post(crate::handlers::review::create_review),
        )
        .route(
            "/reviews/:id",
            put(crate::handlers::review::update_review)
                .delete(crate::handlers::review::delete_review),
        )
        // Search.
        .route("/search", get(crate::handlers::search::search_books))
        // Application state shared across all handlers.
        .with_state(state.clone())
        // Layer ordering: inner layers run first, outer layers wrap them.
        // auth_middleware is innermost (closest to handlers, after routing).
        .layer(middleware::from_fn_with_state(state, auth_middleware))
        // common_headers_middleware adds the standard response headers.
        .layer(middleware::from_fn(common_headers_middleware))
        // metrics_middleware captures the full request lifecycle.
        .layer(middleware::from_fn(metrics_middleware))
        // Request/response tracing and permissive CORS sit outermost.
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// -- Common headers middleware -----------------------------------------------

/// Tower middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `ShelfStore`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // Only set x-request-id if not already present (error handler may set it)
    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        headers.insert("x-request-id", HeaderValue::from_str(&request_id).unwrap());
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    // Always overwrite Date and Server to ensure consistency
    headers.insert("date", HeaderValue::from_str(&date).unwrap());
    headers.insert("server", HeaderValue::from_static("ShelfStore"));

    response
}

// -- Auth middleware ---------------------------------------------------------

/// Decide whether a request shape requires a bearer token.
///
/// Kept in sync with the route table in [`app`]: creating books and
/// reviews, and editing or deleting reviews. Everything else is public.
fn requires_auth(method: &Method, path: &str) -> bool {
    if *method == Method::POST {
        return path == "/books" || (path.starts_with("/books/") && path.ends_with("/reviews"));
    }
    if *method == Method::PUT || *method == Method::DELETE {
        return path.starts_with("/reviews/");
    }
    false
}

/// Bearer-token authentication middleware.
///
/// Public routes pass straight through. For protected routes it pulls
/// the `Authorization: Bearer` token, verifies signature and expiry,
/// resolves the user against live records, and attaches the resulting
/// [`AuthUser`] to request extensions.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !requires_auth(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());
    let token = auth::bearer_token(header).ok_or(ApiError::MissingToken)?;

    let user_id =
        auth::verify_token(token, &state.config.auth.token_secret).map_err(|err| match err {
            TokenError::Expired => ApiError::ExpiredToken,
            TokenError::Invalid => ApiError::InvalidToken,
        })?;

    // A token can outlive its user; resolve against live records.
    let user = state
        .catalog
        .get_user(&user_id)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
        email: user.email,
    });

    Ok(next.run(req).await)
}

// -- Service endpoints --------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `GET /` -- Service welcome document.
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    operation_id = "Welcome",
    responses(
        (status = 200, description = "Welcome document")
    )
)]
async fn welcome() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to the ShelfStore API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /openapi.json` -- Machine-readable API description.
async fn openapi_spec() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// -- Tests --------------------------------------------------------------------

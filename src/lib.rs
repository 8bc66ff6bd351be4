//! ShelfStore library -- book review catalog REST API.
//!
//! This crate provides the core components for running a book review
//! service, including request handling, signup and login, bearer-token
//! authentication, pluggable catalog stores, review management, and
//! title/author search.

use std::sync::Arc;

pub mod auth;
pub mod catalog;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod pagination;
pub mod server;

use crate::catalog::store::CatalogStore;
use crate::config::Config;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Catalog store (in-memory or SQLite).
    pub catalog: Arc<dyn CatalogStore>,
}

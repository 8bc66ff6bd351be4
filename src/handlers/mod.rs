//! HTTP request handlers, one module per resource.

pub mod auth;
pub mod book;
pub mod review;
pub mod search;

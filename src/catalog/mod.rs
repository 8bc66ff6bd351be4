//! Catalog storage layer.
//!
//! Users, books, and reviews live behind the [`store::CatalogStore`]
//! trait. [`sqlite::SqliteCatalogStore`] is the default persistent
//! backend; [`memory::MemoryCatalogStore`] backs tests and ephemeral
//! runs.

pub mod memory;
pub mod sqlite;
pub mod store;

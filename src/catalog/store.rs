//! Abstract catalog store trait.
//!
//! Any storage backend must implement [`CatalogStore`].  The trait
//! uses `async_trait`-style methods (manual desugaring with pinned
//! futures) so the HTTP layer can stay backend-agnostic.
//!
//! Records go in and come out holding bare user/book ids; attaching
//! related user data to a response is the caller's job.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

/// Failure modes surfaced by store implementations.
///
/// `UniqueViolation` stays distinguishable so insert call sites can map
/// a constraint failure to the right duplicate error. Everything else
/// collapses into `Internal`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write: duplicate username,
    /// duplicate email, or a second review for the same (book, user).
    #[error("unique constraint violated")]
    UniqueViolation,

    /// Any other backend failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Shorthand for store operation results.
pub type StoreResult<T> = Result<T, StoreError>;

// ── Record types ────────────────────────────────────────────────────

/// Identity record for a registered user.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// UUID v4 identifier.
    pub id: String,
    /// Unique display name (3-30 chars).
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Bcrypt hash of the password. Never leaves the store layer in a
    /// serialized response.
    pub password_hash: String,
    /// UTC creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Catalog record for a book. Books are never updated or deleted.
#[derive(Debug, Clone)]
pub struct BookRecord {
    /// UUID v4 identifier.
    pub id: String,
    /// Title (1-200 chars).
    pub title: String,
    /// Author name (1-100 chars).
    pub author: String,
    /// Genre (non-empty).
    pub genre: String,
    /// Publication year, 1..=current calendar year.
    pub published_year: i32,
    /// Description (1-2000 chars).
    pub description: String,
    /// Id of the user who created the record.
    pub created_by: String,
    /// UTC creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// One user's review of one book.
#[derive(Debug, Clone)]
pub struct ReviewRecord {
    /// UUID v4 identifier.
    pub id: String,
    /// Review body (1-1000 chars).
    pub text: String,
    /// Star rating, an integer in 1..=5.
    pub rating: u32,
    /// Id of the reviewed book.
    pub book_id: String,
    /// Id of the authoring user.
    pub user_id: String,
    /// UTC creation timestamp.
    pub created_at: DateTime<Utc>,
    /// UTC last-update timestamp. Equals `created_at` until edited.
    pub updated_at: DateTime<Utc>,
}

// ── Query types ─────────────────────────────────────────────────────

/// Optional case-insensitive substring filters for book listings.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    /// Match books whose author contains this.
    pub author: Option<String>,
    /// Match books whose genre contains this.
    pub genre: Option<String>,
}

/// Result of a paged book listing.
#[derive(Debug, Clone)]
pub struct ListBooksResult {
    /// The books on the requested page, newest first.
    pub books: Vec<BookRecord>,
    /// Total number of matches across all pages.
    pub total: u64,
}

/// Result of a paged review listing.
#[derive(Debug, Clone)]
pub struct ListReviewsResult {
    /// The reviews on the requested page, newest first.
    pub reviews: Vec<ReviewRecord>,
    /// Total number of the book's reviews across all pages.
    pub total: u64,
}

// ── Trait ───────────────────────────────────────────────────────────

/// Async catalog store contract.
///
/// Implementors must provide all CRUD operations needed by the API.
pub trait CatalogStore: Send + Sync + 'static {
    // ── Users ───────────────────────────────────────────────────────

    /// Insert a new user. Fails with [`StoreError::UniqueViolation`] if
    /// the username or email is already taken; this constraint is the
    /// race-safe backstop behind the signup pre-check.
    fn insert_user(
        &self,
        record: UserRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>>;

    /// Get a user by id.
    fn get_user(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<UserRecord>>> + Send + '_>>;

    /// Look up a user by email (login path).
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<UserRecord>>> + Send + '_>>;

    /// Check whether any user already holds this email or username, as
    /// a single combined lookup.
    fn identity_taken(
        &self,
        email: &str,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<bool>> + Send + '_>>;

    // ── Books ───────────────────────────────────────────────────────

    /// Insert a new book record.
    fn insert_book(
        &self,
        record: BookRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>>;

    /// Get a book by id.
    fn get_book(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<BookRecord>>> + Send + '_>>;

    /// List books matching `filter`, newest first, windowed by
    /// `offset`/`limit`.
    fn list_books(
        &self,
        filter: &BookFilter,
        offset: u64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = StoreResult<ListBooksResult>> + Send + '_>>;

    /// List books whose title or author contains `query` as a
    /// case-insensitive substring, newest first, windowed by
    /// `offset`/`limit`.
    fn search_books(
        &self,
        query: &str,
        offset: u64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = StoreResult<ListBooksResult>> + Send + '_>>;

    // ── Reviews ─────────────────────────────────────────────────────

    /// Insert a new review. Fails with [`StoreError::UniqueViolation`]
    /// if the (book, user) pair already has one; this constraint is the
    /// race-safe backstop behind the duplicate pre-check.
    fn insert_review(
        &self,
        record: ReviewRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>>;

    /// Get a review by id.
    fn get_review(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<ReviewRecord>>> + Send + '_>>;

    /// Look up the review a user wrote for a book, if any.
    fn find_review_by_book_and_user(
        &self,
        book_id: &str,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<ReviewRecord>>> + Send + '_>>;

    /// List a book's reviews, newest first, windowed by `offset`/`limit`.
    fn list_reviews_for_book(
        &self,
        book_id: &str,
        offset: u64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = StoreResult<ListReviewsResult>> + Send + '_>>;

    /// Overwrite a review's text, rating, and update timestamp.
    fn update_review(
        &self,
        id: &str,
        text: &str,
        rating: u32,
        updated_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>>;

    /// Delete a review by id.
    fn delete_review(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>>;

    /// Mean rating over all of a book's reviews, or `None` when the
    /// book has no reviews. Always covers the full review set, not a
    /// page.
    fn average_rating(
        &self,
        book_id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<f64>>> + Send + '_>>;
}

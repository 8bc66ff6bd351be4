//! In-memory catalog store backed by `HashMap`s.
//!
//! Used by the `memory` engine and by tests. All data is lost on
//! restart. Uniqueness checks run under the write lock, so they carry
//! the same race guarantees the SQLite constraints give.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use crate::catalog::store::{
    BookFilter, BookRecord, CatalogStore, ListBooksResult, ListReviewsResult, ReviewRecord,
    StoreError, StoreResult, UserRecord,
};

/// Mutable state guarded by one RwLock.
#[derive(Debug, Default)]
struct Inner {
    /// user id -> record
    users: HashMap<String, UserRecord>,
    /// book id -> record
    books: HashMap<String, BookRecord>,
    /// review id -> record
    reviews: HashMap<String, ReviewRecord>,
}

/// In-memory implementation of [`CatalogStore`].
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    inner: RwLock<Inner>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Case-insensitive substring containment.
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Apply the author/genre listing filters; absent filters match
/// everything.
fn matches_filter(book: &BookRecord, filter: &BookFilter) -> bool {
    let author_ok = filter
        .author
        .as_deref()
        .map_or(true, |a| contains_ci(&book.author, a));
    let genre_ok = filter
        .genre
        .as_deref()
        .map_or(true, |g| contains_ci(&book.genre, g));
    author_ok && genre_ok
}

/// Search predicate: query appears in the title or the author.
fn matches_query(book: &BookRecord, query: &str) -> bool {
    contains_ci(&book.title, query) || contains_ci(&book.author, query)
}

/// Sort newest-first and cut the requested window out of the full
/// match set.
fn window_page<T>(mut items: Vec<T>, offset: u64, limit: u32) -> (Vec<T>, u64)
where
    T: HasCreatedAt,
{
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (page, total)
}

/// Records orderable by creation time.
trait HasCreatedAt {
    fn created_at(&self) -> chrono::DateTime<chrono::Utc>;
}

impl HasCreatedAt for BookRecord {
    fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }
}

impl HasCreatedAt for ReviewRecord {
    fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }
}

impl CatalogStore for MemoryCatalogStore {
    // ── Users ───────────────────────────────────────────────────────

    fn insert_user(
        &self,
        record: UserRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().expect("rwlock poisoned");
            let taken = inner
                .users
                .values()
                .any(|u| u.email == record.email || u.username == record.username);
            if taken {
                return Err(StoreError::UniqueViolation);
            }
            inner.users.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn get_user(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<UserRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner.users.get(&id).cloned())
        })
    }

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<UserRecord>>> + Send + '_>> {
        let email = email.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner.users.values().find(|u| u.email == email).cloned())
        })
    }

    fn identity_taken(
        &self,
        email: &str,
        username: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<bool>> + Send + '_>> {
        let email = email.to_string();
        let username = username.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner
                .users
                .values()
                .any(|u| u.email == email || u.username == username))
        })
    }

    // ── Books ───────────────────────────────────────────────────────

    fn insert_book(
        &self,
        record: BookRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().expect("rwlock poisoned");
            inner.books.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn get_book(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<BookRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner.books.get(&id).cloned())
        })
    }

    fn list_books(
        &self,
        filter: &BookFilter,
        offset: u64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = StoreResult<ListBooksResult>> + Send + '_>> {
        let filter = filter.clone();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            let matches: Vec<BookRecord> = inner
                .books
                .values()
                .filter(|b| matches_filter(b, &filter))
                .cloned()
                .collect();
            let (books, total) = window_page(matches, offset, limit);
            Ok(ListBooksResult { books, total })
        })
    }

    fn search_books(
        &self,
        query: &str,
        offset: u64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = StoreResult<ListBooksResult>> + Send + '_>> {
        let query = query.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            let matches: Vec<BookRecord> = inner
                .books
                .values()
                .filter(|b| matches_query(b, &query))
                .cloned()
                .collect();
            let (books, total) = window_page(matches, offset, limit);
            Ok(ListBooksResult { books, total })
        })
    }

    // ── Reviews ─────────────────────────────────────────────────────

    fn insert_review(
        &self,
        record: ReviewRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.inner.write().expect("rwlock poisoned");
            let dup = inner
                .reviews
                .values()
                .any(|r| r.book_id == record.book_id && r.user_id == record.user_id);
            if dup {
                return Err(StoreError::UniqueViolation);
            }
            inner.reviews.insert(record.id.clone(), record);
            Ok(())
        })
    }

    fn get_review(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<ReviewRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner.reviews.get(&id).cloned())
        })
    }

    fn find_review_by_book_and_user(
        &self,
        book_id: &str,
        user_id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<ReviewRecord>>> + Send + '_>> {
        let book_id = book_id.to_string();
        let user_id = user_id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            Ok(inner
                .reviews
                .values()
                .find(|r| r.book_id == book_id && r.user_id == user_id)
                .cloned())
        })
    }

    fn list_reviews_for_book(
        &self,
        book_id: &str,
        offset: u64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = StoreResult<ListReviewsResult>> + Send + '_>> {
        let book_id = book_id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            let matches: Vec<ReviewRecord> = inner
                .reviews
                .values()
                .filter(|r| r.book_id == book_id)
                .cloned()
                .collect();
            let (reviews, total) = window_page(matches, offset, limit);
            Ok(ListReviewsResult { reviews, total })
        })
    }

    fn update_review(
        &self,
        id: &str,
        text: &str,
        rating: u32,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        let id = id.to_string();
        let text = text.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().expect("rwlock poisoned");
            if let Some(review) = inner.reviews.get_mut(&id) {
                review.text = text;
                review.rating = rating;
                review.updated_at = updated_at;
            }
            Ok(())
        })
    }

    fn delete_review(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut inner = self.inner.write().expect("rwlock poisoned");
            inner.reviews.remove(&id);
            Ok(())
        })
    }

    fn average_rating(
        &self,
        book_id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<f64>>> + Send + '_>> {
        let book_id = book_id.to_string();
        Box::pin(async move {
            let inner = self.inner.read().expect("rwlock poisoned");
            let ratings: Vec<u32> = inner
                .reviews
                .values()
                .filter(|r| r.book_id == book_id)
                .map(|r| r.rating)
                .collect();
            if ratings.is_empty() {
                return Ok(None);
            }
            let sum: u64 = ratings.iter().map(|&r| u64::from(r)).sum();
            Ok(Some(sum as f64 / ratings.len() as f64))
        })
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn make_user(id: &str, username: &str, email: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            created_at: ts(1_700_000_000),
        }
    }

    fn make_book(id: &str, title: &str, author: &str, genre: &str, secs: i64) -> BookRecord {
        BookRecord {
            id: id.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            genre: genre.to_string(),
            published_year: 1999,
            description: "A book.".to_string(),
            created_by: "u1".to_string(),
            created_at: ts(secs),
        }
    }

    fn make_review(id: &str, book_id: &str, user_id: &str, rating: u32, secs: i64) -> ReviewRecord {
        ReviewRecord {
            id: id.to_string(),
            text: "Good read".to_string(),
            rating,
            book_id: book_id.to_string(),
            user_id: user_id.to_string(),
            created_at: ts(secs),
            updated_at: ts(secs),
        }
    }

    #[test]
    fn test_contains_ci() {
        assert!(contains_ci("The Left Hand of Darkness", "left hand"));
        assert!(contains_ci("Ursula K. Le Guin", "LE GUIN"));
        assert!(!contains_ci("Dune", "left"));
        assert!(contains_ci("anything", ""));
    }

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let store = MemoryCatalogStore::new();
        store
            .insert_user(make_user("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let user = store.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert!(store.get_user("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_user_duplicate_email() {
        let store = MemoryCatalogStore::new();
        store
            .insert_user(make_user("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let err = store
            .insert_user(make_user("u2", "bob", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[tokio::test]
    async fn test_insert_user_duplicate_username() {
        let store = MemoryCatalogStore::new();
        store
            .insert_user(make_user("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let err = store
            .insert_user(make_user("u2", "alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[tokio::test]
    async fn test_find_user_by_email_and_identity_taken() {
        let store = MemoryCatalogStore::new();
        store
            .insert_user(make_user("u1", "alice", "alice@example.com"))
            .await
            .unwrap();

        let found = store
            .find_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "u1");
        assert!(store
            .find_user_by_email("bob@example.com")
            .await
            .unwrap()
            .is_none());

        assert!(store
            .identity_taken("alice@example.com", "somebody")
            .await
            .unwrap());
        assert!(store
            .identity_taken("new@example.com", "alice")
            .await
            .unwrap());
        assert!(!store
            .identity_taken("new@example.com", "bob")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_books_newest_first() {
        let store = MemoryCatalogStore::new();
        store
            .insert_book(make_book("b1", "First", "A", "Fantasy", 100))
            .await
            .unwrap();
        store
            .insert_book(make_book("b2", "Second", "B", "Fantasy", 200))
            .await
            .unwrap();
        store
            .insert_book(make_book("b3", "Third", "C", "Fantasy", 300))
            .await
            .unwrap();

        let result = store
            .list_books(&BookFilter::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(result.total, 3);
        let ids: Vec<&str> = result.books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b3", "b2", "b1"]);
    }

    #[tokio::test]
    async fn test_list_books_filters() {
        let store = MemoryCatalogStore::new();
        store
            .insert_book(make_book("b1", "Dune", "Frank Herbert", "Sci-Fi", 100))
            .await
            .unwrap();
        store
            .insert_book(make_book(
                "b2",
                "A Wizard of Earthsea",
                "Ursula K. Le Guin",
                "Fantasy",
                200,
            ))
            .await
            .unwrap();

        let by_author = BookFilter {
            author: Some("le guin".to_string()),
            genre: None,
        };
        let result = store.list_books(&by_author, 0, 10).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.books[0].id, "b2");

        let by_genre = BookFilter {
            author: None,
            genre: Some("sci".to_string()),
        };
        let result = store.list_books(&by_genre, 0, 10).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.books[0].id, "b1");

        let both = BookFilter {
            author: Some("herbert".to_string()),
            genre: Some("fantasy".to_string()),
        };
        let result = store.list_books(&both, 0, 10).await.unwrap();
        assert_eq!(result.total, 0);
        assert!(result.books.is_empty());
    }

    #[tokio::test]
    async fn test_list_books_window() {
        let store = MemoryCatalogStore::new();
        for i in 0..25 {
            store
                .insert_book(make_book(
                    &format!("b{i}"),
                    &format!("Book {i}"),
                    "A",
                    "G",
                    1000 + i,
                ))
                .await
                .unwrap();
        }

        let result = store
            .list_books(&BookFilter::default(), 20, 10)
            .await
            .unwrap();
        assert_eq!(result.total, 25);
        assert_eq!(result.books.len(), 5);

        let past_end = store
            .list_books(&BookFilter::default(), 30, 10)
            .await
            .unwrap();
        assert_eq!(past_end.total, 25);
        assert!(past_end.books.is_empty());
    }

    #[tokio::test]
    async fn test_search_books() {
        let store = MemoryCatalogStore::new();
        store
            .insert_book(make_book("b1", "Dune", "Frank Herbert", "Sci-Fi", 100))
            .await
            .unwrap();
        store
            .insert_book(make_book("b2", "Dune Messiah", "Frank Herbert", "Sci-Fi", 200))
            .await
            .unwrap();
        store
            .insert_book(make_book("b3", "Hyperion", "Dan Simmons", "Sci-Fi", 300))
            .await
            .unwrap();

        let by_title = store.search_books("dune", 0, 10).await.unwrap();
        assert_eq!(by_title.total, 2);

        let by_author = store.search_books("SIMMONS", 0, 10).await.unwrap();
        assert_eq!(by_author.total, 1);
        assert_eq!(by_author.books[0].id, "b3");

        let none = store.search_books("tolkien", 0, 10).await.unwrap();
        assert_eq!(none.total, 0);
        assert!(none.books.is_empty());
    }

    #[tokio::test]
    async fn test_insert_review_duplicate_pair() {
        let store = MemoryCatalogStore::new();
        store
            .insert_review(make_review("r1", "b1", "u1", 4, 100))
            .await
            .unwrap();

        let err = store
            .insert_review(make_review("r2", "b1", "u1", 5, 200))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));

        // Same user, different book is fine; same book, different user too.
        store
            .insert_review(make_review("r3", "b2", "u1", 5, 300))
            .await
            .unwrap();
        store
            .insert_review(make_review("r4", "b1", "u2", 3, 400))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_review_by_book_and_user() {
        let store = MemoryCatalogStore::new();
        store
            .insert_review(make_review("r1", "b1", "u1", 4, 100))
            .await
            .unwrap();

        let found = store
            .find_review_by_book_and_user("b1", "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, "r1");
        assert!(store
            .find_review_by_book_and_user("b1", "u2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_reviews_scoped_to_book() {
        let store = MemoryCatalogStore::new();
        store
            .insert_review(make_review("r1", "b1", "u1", 4, 100))
            .await
            .unwrap();
        store
            .insert_review(make_review("r2", "b1", "u2", 5, 200))
            .await
            .unwrap();
        store
            .insert_review(make_review("r3", "b2", "u1", 2, 300))
            .await
            .unwrap();

        let result = store.list_reviews_for_book("b1", 0, 10).await.unwrap();
        assert_eq!(result.total, 2);
        let ids: Vec<&str> = result.reviews.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r1"]);
    }

    #[tokio::test]
    async fn test_update_review() {
        let store = MemoryCatalogStore::new();
        store
            .insert_review(make_review("r1", "b1", "u1", 4, 100))
            .await
            .unwrap();

        store
            .update_review("r1", "Changed my mind", 2, ts(500))
            .await
            .unwrap();

        let review = store.get_review("r1").await.unwrap().unwrap();
        assert_eq!(review.text, "Changed my mind");
        assert_eq!(review.rating, 2);
        assert_eq!(review.updated_at, ts(500));
        assert_eq!(review.created_at, ts(100));
    }

    #[tokio::test]
    async fn test_delete_review() {
        let store = MemoryCatalogStore::new();
        store
            .insert_review(make_review("r1", "b1", "u1", 4, 100))
            .await
            .unwrap();

        store.delete_review("r1").await.unwrap();
        assert!(store.get_review("r1").await.unwrap().is_none());

        // Deleting a missing id is a no-op.
        store.delete_review("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_average_rating() {
        let store = MemoryCatalogStore::new();
        assert_eq!(store.average_rating("b1").await.unwrap(), None);

        store
            .insert_review(make_review("r1", "b1", "u1", 3, 100))
            .await
            .unwrap();
        store
            .insert_review(make_review("r2", "b1", "u2", 4, 200))
            .await
            .unwrap();
        store
            .insert_review(make_review("r3", "b1", "u3", 5, 300))
            .await
            .unwrap();
        store
            .insert_review(make_review("r4", "b2", "u1", 1, 400))
            .await
            .unwrap();

        let avg = store.average_rating("b1").await.unwrap().unwrap();
        assert!((avg - 4.0).abs() < f64::EPSILON);
    }
}

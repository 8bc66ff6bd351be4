//! Uniform JSON response envelope and public entity views.
//!
//! Every body the API emits is an [`Envelope`]: `success` is always
//! present, the other fields appear only when the response shape calls
//! for them. The view structs shape persisted records for the wire;
//! password hashes never appear in any of them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::catalog::store::{BookRecord, ReviewRecord, UserRecord};
use crate::pagination::PageMeta;

// ── Envelope ────────────────────────────────────────────────────────

/// Response wrapper: `{success, token?, count?, pagination?, data?,
/// error?, message?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Success envelope carrying only `data`.
    pub fn data(data: T) -> Self {
        Envelope {
            success: true,
            token: None,
            count: None,
            pagination: None,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    /// Success envelope carrying `data` plus a session token.
    pub fn data_with_token(data: T, token: String) -> Self {
        Envelope {
            token: Some(token),
            ..Envelope::data(data)
        }
    }

    /// Success envelope for a listing page: `data` plus the number of
    /// items on this page and the pagination block.
    pub fn page(data: T, count: u64, pagination: PageMeta) -> Self {
        Envelope {
            count: Some(count),
            pagination: Some(pagination),
            ..Envelope::data(data)
        }
    }
}

impl Envelope<Value> {
    /// Failure envelope: `{success: false, error}`.
    pub fn error(message: impl Into<String>) -> Self {
        Envelope {
            success: false,
            token: None,
            count: None,
            pagination: None,
            data: None,
            error: Some(message.into()),
            message: None,
        }
    }

    /// Deletion acknowledgement: `data` is an explicit `null` plus a
    /// confirmation `message`.
    pub fn deleted(message: &str) -> Self {
        Envelope {
            success: true,
            token: None,
            count: None,
            pagination: None,
            data: Some(Value::Null),
            error: None,
            message: Some(message.to_string()),
        }
    }
}

// ── Entity views ────────────────────────────────────────────────────

/// Public view of a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for UserView {
    fn from(record: UserRecord) -> Self {
        UserView {
            id: record.id,
            username: record.username,
            email: record.email,
            created_at: record.created_at,
        }
    }
}

/// Minimal `{id, username}` reference embedded where a record holds a
/// bare user id.
#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

impl From<UserRecord> for UserRef {
    fn from(record: UserRecord) -> Self {
        UserRef {
            id: record.id,
            username: record.username,
        }
    }
}

impl From<AuthUser> for UserRef {
    fn from(user: AuthUser) -> Self {
        UserRef {
            id: user.id,
            username: user.username,
        }
    }
}

/// Public view of a book with its creator attached.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookView {
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i32,
    pub description: String,
    /// `None` when the creating user no longer exists.
    pub created_by: Option<UserRef>,
    pub created_at: DateTime<Utc>,
}

impl BookView {
    pub fn from_record(record: BookRecord, created_by: Option<UserRef>) -> Self {
        BookView {
            id: record.id,
            title: record.title,
            author: record.author,
            genre: record.genre,
            published_year: record.published_year,
            description: record.description,
            created_by,
            created_at: record.created_at,
        }
    }
}

/// Public view of a review with its author attached.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: String,
    pub text: String,
    pub rating: u32,
    /// Id of the reviewed book.
    pub book: String,
    /// `None` when the authoring user no longer exists.
    pub user: Option<UserRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewView {
    pub fn from_record(record: ReviewRecord, user: Option<UserRef>) -> Self {
        ReviewView {
            id: record.id,
            text: record.text,
            rating: record.rating,
            book: record.book_id,
            user,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ── Data payload shapes ─────────────────────────────────────────────

/// `data: {user}` payload.
#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: UserView,
}

/// `data: {book}` payload.
#[derive(Debug, Serialize)]
pub struct BookData {
    pub book: BookView,
}

/// `data: {books}` payload.
#[derive(Debug, Serialize)]
pub struct BooksData {
    pub books: Vec<BookView>,
}

/// `data: {review}` payload.
#[derive(Debug, Serialize)]
pub struct ReviewData {
    pub review: ReviewView,
}

/// `data` payload for the book detail endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    pub book: BookView,
    pub reviews: ReviewListing,
    /// Mean of all the book's ratings, one decimal place; `0` when
    /// there are none.
    pub average_rating: f64,
}

/// Paged review sub-listing inside [`BookDetail`].
#[derive(Debug, Serialize)]
pub struct ReviewListing {
    pub items: Vec<ReviewView>,
    pub count: u64,
    pub pagination: PageMeta,
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sample_user() -> UserRecord {
        UserRecord {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            created_at: ts(1_700_000_000),
        }
    }

    fn sample_book_view() -> BookView {
        let record = BookRecord {
            id: "b1".to_string(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            genre: "Sci-Fi".to_string(),
            published_year: 1965,
            description: "Sand.".to_string(),
            created_by: "u1".to_string(),
            created_at: ts(1_700_000_000),
        };
        BookView::from_record(record, Some(UserRef::from(sample_user())))
    }

    #[test]
    fn test_data_envelope_omits_unused_fields() {
        let value =
            serde_json::to_value(Envelope::data(UserData { user: sample_user().into() })).unwrap();
        assert_eq!(value["success"], true);
        assert!(value.get("token").is_none());
        assert!(value.get("count").is_none());
        assert!(value.get("pagination").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("message").is_none());
        assert_eq!(value["data"]["user"]["username"], "alice");
    }

    #[test]
    fn test_user_view_never_carries_hash() {
        let value = serde_json::to_value(UserView::from(sample_user())).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "username", "email", "createdAt"]);
    }

    #[test]
    fn test_token_envelope() {
        let env = Envelope::data_with_token(
            UserData { user: sample_user().into() },
            "jwt-token".to_string(),
        );
        let value = serde_json::to_value(env).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["token"], "jwt-token");
    }

    #[test]
    fn test_page_envelope() {
        let meta = pagination::window(Some(1), Some(10)).meta(1);
        let env = Envelope::page(BooksData { books: vec![sample_book_view()] }, 1, meta);
        let value = serde_json::to_value(env).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["pagination"]["totalCount"], 1);
        assert_eq!(value["data"]["books"][0]["publishedYear"], 1965);
        assert_eq!(value["data"]["books"][0]["createdBy"]["username"], "alice");
    }

    #[test]
    fn test_error_envelope() {
        let value = serde_json::to_value(Envelope::error("Book not found")).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"], "Book not found");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_deleted_envelope_has_explicit_null_data() {
        let value = serde_json::to_value(Envelope::deleted("Review deleted successfully")).unwrap();
        assert_eq!(value["success"], true);
        assert!(value.as_object().unwrap().contains_key("data"));
        assert!(value["data"].is_null());
        assert_eq!(value["message"], "Review deleted successfully");
    }

    #[test]
    fn test_book_detail_shape() {
        let meta = pagination::window(Some(1), Some(10)).meta(0);
        let detail = BookDetail {
            book: sample_book_view(),
            reviews: ReviewListing {
                items: vec![],
                count: 0,
                pagination: meta,
            },
            average_rating: 0.0,
        };
        let value = serde_json::to_value(Envelope::data(detail)).unwrap();
        assert_eq!(value["data"]["averageRating"], 0.0);
        assert_eq!(value["data"]["reviews"]["count"], 0);
        assert!(value["data"]["reviews"]["items"].as_array().unwrap().is_empty());
    }
}

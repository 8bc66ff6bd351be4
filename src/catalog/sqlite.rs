//! SQLite catalog store.
//!
//! Default persistent backend. A single connection behind a `Mutex`
//! keeps things simple; the catalog workload is light enough that
//! serialized access is not a bottleneck. Uniqueness is enforced by
//! the schema, so concurrent duplicate writes lose cleanly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::catalog::store::{
    BookFilter, BookRecord, CatalogStore, ListBooksResult, ListReviewsResult, ReviewRecord,
    StoreError, StoreResult, UserRecord,
};

/// SQLite-backed implementation of [`CatalogStore`].
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    /// Open (or create) the database at `path` and initialize the
    /// schema. `":memory:"` gives an ephemeral database.
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn apply_pragmas(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}

/// Create the schema if it does not exist yet. Safe to run on every
/// startup.
fn init_db(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version    INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS users (
             id            TEXT PRIMARY KEY,
             username      TEXT NOT NULL UNIQUE,
             email         TEXT NOT NULL UNIQUE,
             password_hash TEXT NOT NULL,
             created_at    TEXT NOT NULL
         );

         CREATE TABLE IF NOT EXISTS books (
             id             TEXT PRIMARY KEY,
             title          TEXT NOT NULL,
             author         TEXT NOT NULL,
             genre          TEXT NOT NULL,
             published_year INTEGER NOT NULL,
             description    TEXT NOT NULL,
             created_by     TEXT NOT NULL,
             created_at     TEXT NOT NULL,

             FOREIGN KEY (created_by) REFERENCES users(id)
         );

         CREATE INDEX IF NOT EXISTS idx_books_created_at
             ON books(created_at);

         CREATE TABLE IF NOT EXISTS reviews (
             id         TEXT PRIMARY KEY,
             text       TEXT NOT NULL,
             rating     INTEGER NOT NULL,
             book_id    TEXT NOT NULL,
             user_id    TEXT NOT NULL,
             created_at TEXT NOT NULL,
             updated_at TEXT NOT NULL,

             UNIQUE (book_id, user_id),
             FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
             FOREIGN KEY (user_id) REFERENCES users(id)
         );

         CREATE INDEX IF NOT EXISTS idx_reviews_book
             ON reviews(book_id);",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?1)",
        params![write_ts(&Utc::now())],
    )?;

    Ok(())
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        // The only constraints that can fire on these tables in practice
        // are the UNIQUE indexes; foreign-key targets are pre-checked by
        // the handlers before any insert.
        if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
            return StoreError::UniqueViolation;
        }
        StoreError::Internal(err.into())
    }
}

/// Serialize a timestamp as fixed-width RFC 3339 in UTC
/// (`2026-08-23T12:00:00.000000Z`) so lexicographic `ORDER BY` is
/// chronological.
fn write_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, surfacing failures through rusqlite so
/// row-mapping closures can propagate them.
fn read_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
        })
}

/// Escape LIKE wildcards in user input, then wrap it in `%` for a
/// substring match. Pairs with `ESCAPE '\'` in the queries.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: read_ts(4, row.get(4)?)?,
    })
}

fn map_book_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookRecord> {
    Ok(BookRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        genre: row.get(3)?,
        published_year: row.get(4)?,
        description: row.get(5)?,
        created_by: row.get(6)?,
        created_at: read_ts(7, row.get(7)?)?,
    })
}

fn map_review_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        id: row.get(0)?,
        text: row.get(1)?,
        rating: row.get(2)?,
        book_id: row.get(3)?,
        user_id: row.get(4)?,
        created_at: read_ts(5, row.get(5)?)?,
        updated_at: read_ts(6, row.get(6)?)?,
    })
}

const BOOK_COLUMNS: &str = "id, title, author, genre, published_year, description, created_by, created_at";
const REVIEW_COLUMNS: &str = "id, text, rating, book_id, user_id, created_at, updated_at";

impl CatalogStore for SqliteCatalogStore {
    // ── Users ───────────────────────────────────────────────────────

    fn insert_user(
        &self,
        record: UserRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.execute(
                "INSERT INTO users (id, username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.username,
                    record.email,
                    record.password_hash,
                    write_ts(&record.created_at),
                ],
            )?;
            Ok(())
        })
    }

    fn get_user(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<UserRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            let user = conn
                .query_row(
                    "SELECT id, username, email, password_hash, created_at
                     FROM users WHERE id = ?1",
                    params![id],
                    map_user_row,
                )
                .optional()?;
            Ok(user)
        })
    }

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<UserRecord>>> + Send + '_>> {
        let email = email.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            let user = conn
                .query_row(
                    "SELECT id, username, email, password_hash, created_at
                     FROM users WHERE email = ?1",
                    params![email],
                    map_user_row,
                )
                .optional()?;
            Ok(user)
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
            let conn = self.conn.lock().expect("mutex poisoned");
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1 OR username = ?2",
                params![email, username],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    // ── Books ───────────────────────────────────────────────────────

    fn insert_book(
        &self,
        record: BookRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.execute(
                "INSERT INTO books (id, title, author, genre, published_year, description, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.title,
                    record.author,
                    record.genre,
                    record.published_year,
                    record.description,
                    record.created_by,
                    write_ts(&record.created_at),
                ],
            )?;
            Ok(())
        })
    }

    fn get_book(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<BookRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            let book = conn
                .query_row(
                    &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                    params![id],
                    map_book_row,
                )
                .optional()?;
            Ok(book)
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
            let conn = self.conn.lock().expect("mutex poisoned");

            // Assemble the WHERE clause from whichever filters are set.
            let mut clauses: Vec<&str> = Vec::new();
            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            if let Some(author) = &filter.author {
                clauses.push("author LIKE ? ESCAPE '\\'");
                args.push(Box::new(like_pattern(author)));
            }
            if let Some(genre) = &filter.genre {
                clauses.push("genre LIKE ? ESCAPE '\\'");
                args.push(Box::new(like_pattern(genre)));
            }
            let where_sql = if clauses.is_empty() {
                String::new()
            } else {
                format!(" WHERE {}", clauses.join(" AND "))
            };

            let total: i64 = {
                let arg_refs: Vec<&dyn rusqlite::types::ToSql> =
                    args.iter().map(|a| a.as_ref()).collect();
                conn.query_row(
                    &format!("SELECT COUNT(*) FROM books{where_sql}"),
                    arg_refs.as_slice(),
                    |row| row.get(0),
                )?
            };

            args.push(Box::new(limit as i64));
            args.push(Box::new(offset as i64));
            let arg_refs: Vec<&dyn rusqlite::types::ToSql> =
                args.iter().map(|a| a.as_ref()).collect();

            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOK_COLUMNS} FROM books{where_sql}
                 ORDER BY created_at DESC
                 LIMIT ? OFFSET ?"
            ))?;
            let rows = stmt.query_map(arg_refs.as_slice(), map_book_row)?;
            let mut books = Vec::new();
            for row in rows {
                books.push(row?);
            }

            Ok(ListBooksResult {
                books,
                total: total as u64,
            })
        })
    }

    fn search_books(
        &self,
        query: &str,
        offset: u64,
        limit: u32,
    ) -> Pin<Box<dyn Future<Output = StoreResult<ListBooksResult>> + Send + '_>> {
        let pattern = like_pattern(query);
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM books
                 WHERE title LIKE ?1 ESCAPE '\\' OR author LIKE ?1 ESCAPE '\\'",
                params![pattern],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {BOOK_COLUMNS} FROM books
                 WHERE title LIKE ?1 ESCAPE '\\' OR author LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(
                params![pattern, limit as i64, offset as i64],
                map_book_row,
            )?;
            let mut books = Vec::new();
            for row in rows {
                books.push(row?);
            }

            Ok(ListBooksResult {
                books,
                total: total as u64,
            })
        })
    }

    // ── Reviews ─────────────────────────────────────────────────────

    fn insert_review(
        &self,
        record: ReviewRecord,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.execute(
                "INSERT INTO reviews (id, text, rating, book_id, user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.text,
                    record.rating,
                    record.book_id,
                    record.user_id,
                    write_ts(&record.created_at),
                    write_ts(&record.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    fn get_review(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<ReviewRecord>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            let review = conn
                .query_row(
                    &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1"),
                    params![id],
                    map_review_row,
                )
                .optional()?;
            Ok(review)
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
            let conn = self.conn.lock().expect("mutex poisoned");
            let review = conn
                .query_row(
                    &format!(
                        "SELECT {REVIEW_COLUMNS} FROM reviews
                         WHERE book_id = ?1 AND user_id = ?2"
                    ),
                    params![book_id, user_id],
                    map_review_row,
                )
                .optional()?;
            Ok(review)
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
            let conn = self.conn.lock().expect("mutex poisoned");

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM reviews WHERE book_id = ?1",
                params![book_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {REVIEW_COLUMNS} FROM reviews
                 WHERE book_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(
                params![book_id, limit as i64, offset as i64],
                map_review_row,
            )?;
            let mut reviews = Vec::new();
            for row in rows {
                reviews.push(row?);
            }

            Ok(ListReviewsResult {
                reviews,
                total: total as u64,
            })
        })
    }

    fn update_review(
        &self,
        id: &str,
        text: &str,
        rating: u32,
        updated_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        let id = id.to_string();
        let text = text.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.execute(
                "UPDATE reviews SET text = ?1, rating = ?2, updated_at = ?3 WHERE id = ?4",
                params![text, rating, write_ts(&updated_at), id],
            )?;
            Ok(())
        })
    }

    fn delete_review(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.execute("DELETE FROM reviews WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    fn average_rating(
        &self,
        book_id: &str,
    ) -> Pin<Box<dyn Future<Output = StoreResult<Option<f64>>> + Send + '_>> {
        let book_id = book_id.to_string();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            // AVG over zero rows is NULL, which maps to None here.
            let avg: Option<f64> = conn.query_row(
                "SELECT AVG(rating) FROM reviews WHERE book_id = ?1",
                params![book_id],
                |row| row.get(0),
            )?;
            Ok(avg)
        })
    }
}

// -- Tests --------------------------------------------------------------------

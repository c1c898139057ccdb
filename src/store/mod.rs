//! Book persistence: the store contract, its error taxonomy, and the PostgreSQL and in-memory backends.

mod memory;
mod postgres;

pub use memory::InMemoryBookStore;
pub use postgres::{PgBookStore, BOOKS_TABLE};

use crate::filters::{Filters, Metadata};
use crate::models::Book;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on any single store call.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Year filter value meaning "any year".
pub const ANY_YEAR: i32 = -1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    RecordNotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("unsafe sort parameter: {0}")]
    UnsafeSort(String),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence operations for books. Implementations hold no per-request state;
/// concurrent writers are arbitrated by the version check in [`BookStore::update`].
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Store a new book, filling in `id`, `created_at` and `version`.
    async fn insert(&self, book: &mut Book) -> Result<(), StoreError>;

    async fn get(&self, id: i64) -> Result<Book, StoreError>;

    /// Write `book` if the stored version still equals `book.version`, then bump
    /// `book.version` to the new stored value. A version mismatch is `EditConflict`.
    async fn update(&self, book: &mut Book) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Books whose title matches `title` (empty matches all) and whose year equals
    /// `year` ([`ANY_YEAR`] matches all), ordered and windowed by `filters`.
    async fn get_all(
        &self,
        title: &str,
        year: i32,
        filters: &Filters,
    ) -> Result<(Vec<Book>, Metadata), StoreError>;
}

/// Run `fut`, failing with `StoreError::Timeout` if it outlives `limit`.
pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}

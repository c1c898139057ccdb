//! PostgreSQL-backed book store.

use super::{with_timeout, BookStore, StoreError, QUERY_TIMEOUT};
use crate::filters::{Filters, Metadata};
use crate::models::Book;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;

pub const BOOKS_TABLE: &str = "books";

#[derive(sqlx::FromRow)]
struct ListedBook {
    total_records: i64,
    #[sqlx(flatten)]
    book: Book,
}

#[derive(Clone)]
pub struct PgBookStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgBookStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            timeout: QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// ORDER BY clause for a list query. Column names only ever come from the safelist.
fn order_clause(filters: &Filters) -> Result<String, StoreError> {
    let column = filters
        .sort_column()
        .ok_or_else(|| StoreError::UnsafeSort(filters.sort.clone()))?;
    Ok(format!(
        "ORDER BY {} {}, id ASC",
        column,
        filters.sort_direction().as_sql()
    ))
}

#[async_trait]
impl BookStore for PgBookStore {
    async fn insert(&self, book: &mut Book) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (title, year, pages) VALUES ($1, $2, $3) RETURNING id, created_at, version",
            BOOKS_TABLE
        );
        tracing::debug!(sql = %sql, title = %book.title, "insert book");
        let (id, created_at, version): (i64, DateTime<Utc>, i32) = with_timeout(self.timeout, async {
            Ok::<_, StoreError>(sqlx::query_as(&sql)
                .bind(&book.title)
                .bind(book.year)
                .bind(book.pages)
                .fetch_one(&self.pool)
                .await?)
        })
        .await?;
        book.id = id;
        book.created_at = created_at;
        book.version = version;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Book, StoreError> {
        if id < 1 {
            return Err(StoreError::RecordNotFound);
        }
        let sql = format!(
            "SELECT id, created_at, title, year, pages, version FROM {} WHERE id = $1",
            BOOKS_TABLE
        );
        tracing::debug!(sql = %sql, id, "get book");
        let row: Option<Book> = with_timeout(self.timeout, async {
            Ok::<_, StoreError>(sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?)
        })
        .await?;
        row.ok_or(StoreError::RecordNotFound)
    }

    async fn update(&self, book: &mut Book) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE {} SET title = $1, year = $2, pages = $3, version = version + 1 \
             WHERE id = $4 AND version = $5 RETURNING version",
            BOOKS_TABLE
        );
        tracing::debug!(sql = %sql, id = book.id, version = book.version, "update book");
        let row: Option<(i32,)> = with_timeout(self.timeout, async {
            Ok::<_, StoreError>(sqlx::query_as(&sql)
                .bind(&book.title)
                .bind(book.year)
                .bind(book.pages)
                .bind(book.id)
                .bind(book.version)
                .fetch_optional(&self.pool)
                .await?)
        })
        .await?;
        let (version,) = row.ok_or(StoreError::EditConflict)?;
        book.version = version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::RecordNotFound);
        }
        let sql = format!("DELETE FROM {} WHERE id = $1", BOOKS_TABLE);
        tracing::debug!(sql = %sql, id, "delete book");
        let result = with_timeout(self.timeout, async {
            Ok::<_, StoreError>(sqlx::query(&sql).bind(id).execute(&self.pool).await?)
        })
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound);
        }
        Ok(())
    }

    async fn get_all(
        &self,
        title: &str,
        year: i32,
        filters: &Filters,
    ) -> Result<(Vec<Book>, Metadata), StoreError> {
        let sql = format!(
            "SELECT count(*) OVER() AS total_records, id, created_at, title, year, pages, version \
             FROM {} \
             WHERE (to_tsvector('simple', title) @@ plainto_tsquery('simple', $1) OR $1 = '') \
             AND (year = $2 OR $2 = -1) \
             {} \
             LIMIT $3 OFFSET $4",
            BOOKS_TABLE,
            order_clause(filters)?
        );
        tracing::debug!(sql = %sql, title, year, page = filters.page, "list books");
        let rows: Vec<ListedBook> = with_timeout(self.timeout, async {
            Ok::<_, StoreError>(sqlx::query_as(&sql)
                .bind(title)
                .bind(year)
                .bind(filters.limit())
                .bind(filters.offset())
                .fetch_all(&self.pool)
                .await?)
        })
        .await?;

        let total_records = rows.first().map(|r| r.total_records).unwrap_or(0);
        let books = rows.into_iter().map(|r| r.book).collect();
        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        Ok((books, metadata))
    }
}

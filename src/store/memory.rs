//! In-process book store with the same contract as the PostgreSQL store.
//! Used by tests and for running the API without a database.

use super::{BookStore, StoreError, ANY_YEAR};
use crate::filters::{Filters, Metadata, SortDirection};
use crate::models::Book;
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Rows {
    next_id: i64,
    books: BTreeMap<i64, Book>,
}

#[derive(Default)]
pub struct InMemoryBookStore {
    rows: RwLock<Rows>,
}

impl InMemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.books.len()
    }
}

/// Lowercased alphanumeric words, the way the `simple` text search configuration splits text.
fn lexemes(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Every word of `query` appears as a word of `title`. A non-empty query with
/// no words (only punctuation) matches nothing, like an empty `plainto_tsquery`.
fn title_matches(title: &str, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let wanted = lexemes(query);
    if wanted.is_empty() {
        return false;
    }
    let words = lexemes(title);
    wanted.iter().all(|q| words.contains(q))
}

fn compare_by(column: &str, a: &Book, b: &Book) -> Ordering {
    match column {
        "title" => a.title.cmp(&b.title),
        "year" => a.year.cmp(&b.year),
        "pages" => a.pages.cmp(&b.pages),
        _ => a.id.cmp(&b.id),
    }
}

#[async_trait]
impl BookStore for InMemoryBookStore {
    async fn insert(&self, book: &mut Book) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.next_id += 1;
        book.id = rows.next_id;
        book.created_at = Utc::now();
        book.version = 1;
        rows.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Book, StoreError> {
        if id < 1 {
            return Err(StoreError::RecordNotFound);
        }
        self.rows
            .read()
            .await
            .books
            .get(&id)
            .cloned()
            .ok_or(StoreError::RecordNotFound)
    }

    async fn update(&self, book: &mut Book) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let stored = rows
            .books
            .get_mut(&book.id)
            .filter(|stored| stored.version == book.version)
            .ok_or(StoreError::EditConflict)?;
        stored.title = book.title.clone();
        stored.year = book.year;
        stored.pages = book.pages;
        stored.version += 1;
        book.version = stored.version;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::RecordNotFound);
        }
        self.rows
            .write()
            .await
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::RecordNotFound)
    }

    async fn get_all(
        &self,
        title: &str,
        year: i32,
        filters: &Filters,
    ) -> Result<(Vec<Book>, Metadata), StoreError> {
        let column = filters
            .sort_column()
            .ok_or_else(|| StoreError::UnsafeSort(filters.sort.clone()))?;
        let direction = filters.sort_direction();

        let mut matched: Vec<Book> = self
            .rows
            .read()
            .await
            .books
            .values()
            .filter(|b| title_matches(&b.title, title))
            .filter(|b| year == ANY_YEAR || b.year == year)
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            let primary = match direction {
                SortDirection::Asc => compare_by(column, a, b),
                SortDirection::Desc => compare_by(column, b, a),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let offset = usize::try_from(filters.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(filters.limit()).unwrap_or(0);
        let page: Vec<Book> = matched.into_iter().skip(offset).take(limit).collect();

        // The windowed count is only observed through returned rows, as with count(*) OVER().
        let total_records = if page.is_empty() { 0 } else { total };
        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        Ok((page, metadata))
    }
}

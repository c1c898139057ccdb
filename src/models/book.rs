//! Book record, its JSON inputs, and the field rules every stored book satisfies.

use crate::validator::Validator;
use chrono::{DateTime, Datelike, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

pub const MAX_TITLE_BYTES: usize = 500;
pub const MIN_YEAR: i32 = 1888;

/// Columns a book listing may be ordered by, with `-` marking descending order.
pub const SORT_SAFELIST: &[&str] = &["id", "title", "year", "pages", "-id", "-title", "-year", "-pages"];

/// A book as stored. `id`, `created_at` and `version` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub year: i32,
    #[serde(skip_serializing_if = "Pages::is_zero")]
    pub pages: Pages,
    pub version: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl Book {
    /// A book that has not been stored yet.
    pub fn new(title: impl Into<String>, year: i32, pages: Pages) -> Self {
        Self {
            id: 0,
            created_at: DateTime::<Utc>::default(),
            title: title.into(),
            year,
            pages,
            version: 0,
        }
    }
}

/// Page count. Rendered in JSON as `"<n> pages"`; accepted as that string or a bare integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, sqlx::Type)]
#[sqlx(transparent)]
pub struct Pages(pub i32);

impl Pages {
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Pages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pages", self.0)
    }
}

impl Serialize for Pages {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pages {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PagesVisitor;

        impl Visitor<'_> for PagesVisitor {
            type Value = Pages;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(r#"an integer or a string of the form "<n> pages""#)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Pages, E> {
                i32::try_from(v)
                    .map(Pages)
                    .map_err(|_| E::custom("pages out of range"))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Pages, E> {
                i32::try_from(v)
                    .map(Pages)
                    .map_err(|_| E::custom("pages out of range"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Pages, E> {
                v.strip_suffix(" pages")
                    .and_then(|n| n.parse::<i32>().ok())
                    .map(Pages)
                    .ok_or_else(|| E::custom("invalid pages format"))
            }
        }

        deserializer.deserialize_any(PagesVisitor)
    }
}

/// Body of a create request.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBookInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub pages: Pages,
}

impl From<CreateBookInput> for Book {
    fn from(input: CreateBookInput) -> Self {
        Book::new(input.title, input.year, input.pages)
    }
}

/// Body of a partial update. Absent or null fields leave the stored value untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub pages: Option<Pages>,
}

impl UpdateBookInput {
    /// Overwrite the fields present in this patch onto `book`.
    pub fn apply(self, book: &mut Book) {
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(year) = self.year {
            book.year = year;
        }
        if let Some(pages) = self.pages {
            book.pages = pages;
        }
    }
}

pub fn validate_book(v: &mut Validator, book: &Book) {
    validate_book_at(v, book, Utc::now().year());
}

/// Same as [`validate_book`] with an explicit current year.
pub fn validate_book_at(v: &mut Validator, book: &Book, current_year: i32) {
    v.check(!book.title.is_empty(), "title", "must be provided");
    v.check(
        book.title.len() <= MAX_TITLE_BYTES,
        "title",
        "must not be more than 500 bytes long",
    );

    v.check(book.year != 0, "year", "must be provided");
    v.check(book.year >= MIN_YEAR, "year", "must be greater than 1888");
    v.check(book.year <= current_year, "year", "must not be in the future");

    v.check(!book.pages.is_zero(), "pages", "must be provided");
    v.check(book.pages.0 > 0, "pages", "must be a positive integer");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn errors_for(book: &Book) -> crate::validator::ValidationErrors {
        let mut v = Validator::new();
        validate_book_at(&mut v, book, 2024);
        v.into_errors()
    }

    #[test]
    fn valid_book_passes() {
        for book in [
            Book::new("Dune", 1965, Pages(412)),
            Book::new("a", MIN_YEAR, Pages(1)),
            Book::new("x".repeat(MAX_TITLE_BYTES), 2024, Pages(i32::MAX)),
        ] {
            assert!(errors_for(&book).is_empty(), "{book:?}");
        }
    }

    #[test]
    fn empty_fields_report_must_be_provided() {
        let errors = errors_for(&Book::new("", 0, Pages(0)));
        assert_eq!(errors["title"], "must be provided");
        assert_eq!(errors["year"], "must be provided");
        assert_eq!(errors["pages"], "must be provided");
    }

    #[test]
    fn title_length_is_measured_in_bytes() {
        // 250 two-byte characters fit, 251 do not.
        assert!(errors_for(&Book::new("é".repeat(250), 2000, Pages(10))).is_empty());
        let errors = errors_for(&Book::new("é".repeat(251), 2000, Pages(10)));
        assert_eq!(errors["title"], "must not be more than 500 bytes long");
    }

    #[test]
    fn year_bounds() {
        assert_eq!(
            errors_for(&Book::new("t", 1887, Pages(1)))["year"],
            "must be greater than 1888"
        );
        assert_eq!(
            errors_for(&Book::new("t", -5, Pages(1)))["year"],
            "must be greater than 1888"
        );
        assert_eq!(
            errors_for(&Book::new("t", 2025, Pages(1)))["year"],
            "must not be in the future"
        );
    }

    #[test]
    fn negative_pages_are_rejected() {
        assert_eq!(
            errors_for(&Book::new("t", 2000, Pages(-3)))["pages"],
            "must be a positive integer"
        );
    }

    #[test]
    fn validate_book_uses_current_year() {
        let mut v = Validator::new();
        validate_book(&mut v, &Book::new("t", Utc::now().year() + 1, Pages(1)));
        assert_eq!(v.errors()["year"], "must not be in the future");
    }

    #[test]
    fn book_json_hides_created_at_and_formats_pages() {
        let mut book = Book::new("Dune", 1965, Pages(412));
        book.id = 7;
        book.version = 1;
        assert_eq!(
            serde_json::to_value(&book).unwrap(),
            json!({"id": 7, "title": "Dune", "year": 1965, "pages": "412 pages", "version": 1})
        );
    }

    #[test]
    fn book_json_omits_zero_year_and_pages() {
        let book = Book::new("Untitled", 0, Pages(0));
        let value = serde_json::to_value(&book).unwrap();
        assert!(value.get("year").is_none());
        assert!(value.get("pages").is_none());
    }

    #[test]
    fn pages_accepts_integer_or_suffixed_string() {
        assert_eq!(serde_json::from_value::<Pages>(json!(320)).unwrap(), Pages(320));
        assert_eq!(serde_json::from_value::<Pages>(json!("320 pages")).unwrap(), Pages(320));
        assert!(serde_json::from_value::<Pages>(json!("320")).is_err());
        assert!(serde_json::from_value::<Pages>(json!("many pages")).is_err());
        assert!(serde_json::from_value::<Pages>(json!(1.5)).is_err());
    }

    #[test]
    fn create_input_rejects_unknown_fields() {
        let err = serde_json::from_value::<CreateBookInput>(json!({"title": "t", "version": 9}));
        assert!(err.is_err());
    }

    #[test]
    fn update_input_applies_only_present_fields() {
        let mut book = Book::new("Old", 1990, Pages(100));
        book.version = 3;
        let patch: UpdateBookInput =
            serde_json::from_value(json!({"title": "New", "year": null})).unwrap();
        patch.apply(&mut book);
        assert_eq!(book.title, "New");
        assert_eq!(book.year, 1990);
        assert_eq!(book.pages, Pages(100));
        assert_eq!(book.version, 3);
    }
}

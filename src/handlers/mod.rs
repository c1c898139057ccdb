//! HTTP handlers for books and service health.

pub mod books;
pub mod health;

pub use books::{create_book, delete_book, list_books, show_book, update_book, EXPECTED_VERSION_HEADER};
pub use health::healthcheck;

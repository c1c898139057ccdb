//! Bookshelf API: a JSON HTTP service for a catalogue of books, with optimistic
//! concurrency on updates, filtered and paginated listings, and bearer-token permissions.

pub mod config;
pub mod error;
pub mod extractors;
pub mod filters;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;
pub mod validator;

pub use config::{AppConfig, LimiterConfig};
pub use error::{AppError, ConfigError};
pub use filters::{Filters, Metadata};
pub use migration::{ensure_books_table, ensure_database_exists};
pub use models::{Book, Pages};
pub use routes::app;
pub use state::AppState;
pub use store::{BookStore, InMemoryBookStore, PgBookStore, StoreError};
pub use validator::Validator;

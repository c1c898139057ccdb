//! Domain records exposed by the API.

pub mod book;

pub use book::{
    validate_book, Book, CreateBookInput, Pages, UpdateBookInput, SORT_SAFELIST,
};

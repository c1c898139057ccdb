//! Response envelope helpers. Every body is a JSON object keyed by what it carries.

use crate::filters::Metadata;
use axum::{
    http::{header, StatusCode},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct BookEnvelope<T> {
    pub books: T,
}

#[derive(Serialize)]
pub struct BookListEnvelope<T> {
    pub books: Vec<T>,
    pub metadata: Metadata,
}

#[derive(Serialize)]
pub struct MessageEnvelope {
    pub message: String,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<BookEnvelope<T>>) {
    (StatusCode::OK, Json(BookEnvelope { books: data }))
}

/// 201 with a `Location` header pointing at the new resource.
pub fn success_created<T: Serialize>(
    data: T,
    location: String,
) -> (StatusCode, [(header::HeaderName, String); 1], Json<BookEnvelope<T>>) {
    (
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(BookEnvelope { books: data }),
    )
}

pub fn success_many<T: Serialize>(
    data: Vec<T>,
    metadata: Metadata,
) -> (StatusCode, Json<BookListEnvelope<T>>) {
    (
        StatusCode::OK,
        Json(BookListEnvelope {
            books: data,
            metadata,
        }),
    )
}

pub fn message(text: impl Into<String>) -> (StatusCode, Json<MessageEnvelope>) {
    (
        StatusCode::OK,
        Json(MessageEnvelope {
            message: text.into(),
        }),
    )
}

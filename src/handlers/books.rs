//! Book handlers: create, show, update, delete, list.

use crate::error::AppError;
use crate::extractors::{decode, unreadable_body, JsonBody};
use crate::filters::{validate_filters, Filters};
use crate::models::{validate_book, Book, CreateBookInput, UpdateBookInput, SORT_SAFELIST};
use crate::response::{message, success_created, success_many, success_one};
use crate::state::AppState;
use crate::store::ANY_YEAR;
use crate::validator::Validator;
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, PathRejection},
        Path, Query, State,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use std::collections::HashMap;
use std::str::FromStr;

/// Precondition header for updates; must equal the stored version when present.
pub const EXPECTED_VERSION_HEADER: &str = "X-Expected-Version";

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 20;
const DEFAULT_SORT: &str = "id";

/// Ids that are not positive integers address nothing.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(AppError::NotFound),
    }
}

/// Path segments that do not even decode (e.g. invalid UTF-8) are missing records too.
fn path_id(path: Result<Path<String>, PathRejection>) -> Result<i64, AppError> {
    match path {
        Ok(Path(raw)) => parse_id(&raw),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "undecodable book id");
            Err(AppError::NotFound)
        }
    }
}

/// A present, non-blank header must equal `version` byte for byte. Values that
/// are not visible ASCII never match.
fn expected_version_matches(headers: &HeaderMap, version: i32) -> bool {
    let Some(value) = headers.get(EXPECTED_VERSION_HEADER) else {
        return true;
    };
    let raw = value.as_bytes();
    let start = raw.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(raw.len());
    let end = raw.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    let expected = &raw[start..end];
    expected.is_empty() || expected == version.to_string().as_bytes()
}

fn ensure_valid(v: Validator) -> Result<(), AppError> {
    if v.valid() {
        Ok(())
    } else {
        Err(AppError::FailedValidation(v.into_errors()))
    }
}

pub async fn create_book(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateBookInput>,
) -> Result<impl IntoResponse, AppError> {
    let mut book = Book::from(input);
    let mut v = Validator::new();
    validate_book(&mut v, &book);
    ensure_valid(v)?;

    state.store().insert(&mut book).await?;
    tracing::info!(id = book.id, "book created");
    let location = format!("/v1/books/{}", book.id);
    Ok(success_created(book, location))
}

pub async fn show_book(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(id)?;
    let book = state.store().get(id).await?;
    Ok(success_one(book))
}

/// Partial update. The body is decoded only after the record and its version
/// precondition check out, so a missing record answers 404 whatever the body holds.
pub async fn update_book(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(id)?;
    let mut book = state.store().get(id).await?;

    if !expected_version_matches(&headers, book.version) {
        tracing::debug!(id, current = book.version, "stale expected version");
        return Err(AppError::EditConflict);
    }

    let patch: UpdateBookInput = decode(&body.map_err(unreadable_body)?)?;
    patch.apply(&mut book);

    let mut v = Validator::new();
    validate_book(&mut v, &book);
    ensure_valid(v)?;

    state.store().update(&mut book).await?;
    tracing::info!(id = book.id, version = book.version, "book updated");
    Ok(success_one(book))
}

pub async fn delete_book(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = path_id(id)?;
    state.store().delete(id).await?;
    tracing::info!(id, "book deleted");
    Ok(message("books successfully deleted"))
}

/// `GET /v1/books?title=&year=&page=&page_size=&sort=`
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let mut v = Validator::new();
    let title = read_string(&params, "title", "");
    let year = read_int(&params, "year", ANY_YEAR, &mut v);
    let filters = Filters {
        page: read_int(&params, "page", DEFAULT_PAGE, &mut v),
        page_size: read_int(&params, "page_size", DEFAULT_PAGE_SIZE, &mut v),
        sort: read_string(&params, "sort", DEFAULT_SORT),
        sort_safelist: SORT_SAFELIST,
    };
    validate_filters(&mut v, &filters);
    ensure_valid(v)?;

    let (books, metadata) = state.store().get_all(&title, year, &filters).await?;
    Ok(success_many(books, metadata))
}

fn read_string(params: &HashMap<String, String>, key: &str, default: &str) -> String {
    match params.get(key) {
        Some(s) if !s.is_empty() => s.clone(),
        _ => default.to_string(),
    }
}

/// Absent or empty means `default`; anything unparsable records an error and yields `default`.
fn read_int<T: FromStr>(params: &HashMap<String, String>, key: &str, default: T, v: &mut Validator) -> T {
    match params.get(key).map(String::as_str) {
        None | Some("") => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

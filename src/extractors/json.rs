//! JSON request bodies decoded strictly, with client-facing error messages.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, FromRequest, Request},
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Like `axum::Json`, but does not require a `Content-Type` and rejects with [`AppError::BadRequest`].
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(unreadable_body)?;
        decode(&bytes).map(JsonBody)
    }
}

/// The only way a buffered body fails to read here is by exceeding the size limit.
pub fn unreadable_body(rejection: BytesRejection) -> AppError {
    tracing::debug!(error = %rejection, "request body unreadable");
    AppError::BadRequest(format!("body must not be larger than {} bytes", MAX_BODY_BYTES))
}

/// Decode a single JSON value from `bytes`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::BadRequest("body must not be empty".into()));
    }
    serde_json::from_slice(bytes).map_err(|e| AppError::BadRequest(describe(&e)))
}

fn describe(e: &serde_json::Error) -> String {
    match e.classify() {
        Category::Eof => "body contains badly-formed JSON".into(),
        Category::Syntax if e.to_string().starts_with("trailing characters") => {
            "body must only contain a single JSON value".into()
        }
        Category::Syntax => format!("body contains badly-formed JSON (at line {} column {})", e.line(), e.column()),
        Category::Data => format!("body contains invalid data: {}", e),
        Category::Io => "body could not be read".into(),
    }
}

//! Request middleware: authentication, permissions, rate limiting, error normalisation.

pub mod auth;
pub mod rate_limit;

pub use auth::{authenticate, require_permission, Permission, Principal, StaticTokens, TokenResolver};
pub use rate_limit::{build_limiter, rate_limit, spawn_pruner, ClientLimiter};

use crate::error::AppError;
use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Replace axum's empty 405 with the JSON error body, keeping the `Allow` header.
pub async fn method_not_allowed(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allow = response.headers().get(header::ALLOW).cloned();
    let mut replaced = AppError::MethodNotAllowed(method).into_response();
    if let Some(allow) = allow {
        replaced.headers_mut().insert(header::ALLOW, allow);
    }
    replaced
}

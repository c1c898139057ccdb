//! Routes open to every caller.

use crate::handlers::healthcheck;
use crate::state::AppState;
use axum::{routing::get, Router};

/// GET /v1/healthcheck
pub fn common_routes() -> Router<AppState> {
    Router::new().route("/v1/healthcheck", get(healthcheck))
}

//! Liveness report.

use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthBody {
    status: &'static str,
    system_info: SystemInfo,
}

#[derive(Serialize)]
struct SystemInfo {
    environment: String,
    version: &'static str,
}

pub async fn healthcheck(State(state): State<AppState>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "available",
        system_info: SystemInfo {
            environment: state.environment().to_string(),
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}

//! Health check routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::models::HealthResponse;
use crate::api::server::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let status = if state.scheduler.is_running() {
        "healthy"
    } else {
        "stopping"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        jobs: state.scheduler.job_count(),
        active_attempts: state.scheduler.active_attempts(),
    }))
}

//! Job inspection and lifecycle routes.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/jobs` | List all jobs with runtime state |
//! | GET | `/jobs/{id}` | Get a single job |
//! | POST | `/jobs/{id}/pause` | Pause an active job |
//! | POST | `/jobs/{id}/resume` | Resume a paused job |
//! | POST | `/jobs/{id}/stop` | Stop a job |
//! | POST | `/jobs/{id}/enable` | Re-enable a job |
//! | POST | `/jobs/{id}/trigger` | Dispatch a job immediately |

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{ActionResponse, JobListResponse};
use crate::api::server::AppState;
use crate::scheduler::JobSnapshot;

/// Create the jobs router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_jobs))
        .route("/{id}", get(get_job))
        .route("/{id}/pause", post(pause_job))
        .route("/{id}/resume", post(resume_job))
        .route("/{id}/stop", post(stop_job))
        .route("/{id}/enable", post(enable_job))
        .route("/{id}/trigger", post(trigger_job))
}

async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<JobListResponse>> {
    let jobs = state.scheduler.list_jobs().await;
    let total = jobs.len();
    Ok(Json(JobListResponse { jobs, total }))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .scheduler
        .get_job(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("job {id} not found")))
}

async fn pause_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    apply(state.scheduler.pause_job(&id).await, id, "pause")
}

async fn resume_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    apply(state.scheduler.resume_job(&id).await, id, "resume")
}

async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    apply(state.scheduler.stop_job(&id).await, id, "stop")
}

async fn enable_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    apply(state.scheduler.enable_job(&id).await, id, "enable")
}

async fn trigger_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionResponse>> {
    if state.scheduler.get_job(&id).await.is_none() {
        return Err(ApiError::not_found(format!("job {id} not found")));
    }
    if !state.scheduler.trigger_job(&id).await {
        return Err(ApiError::conflict(format!(
            "job {id} is not in a runnable state"
        )));
    }
    Ok(Json(ActionResponse {
        id,
        action: "trigger".to_string(),
        applied: true,
    }))
}

fn apply(applied: bool, id: String, action: &str) -> ApiResult<Json<ActionResponse>> {
    if !applied {
        return Err(ApiError::not_found(format!("job {id} not found")));
    }
    Ok(Json(ActionResponse {
        id,
        action: action.to_string(),
        applied: true,
    }))
}

//! Programmatic input feeding routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{AppendItemsRequest, AppendItemsResponse};
use crate::api::server::AppState;

/// Create the inputs router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/items", post(append_items))
}

/// Append items to a list input.
async fn append_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AppendItemsRequest>,
) -> ApiResult<Json<AppendItemsResponse>> {
    if !state.scheduler.input_manager().contains(&id) {
        return Err(ApiError::not_found(format!("input {id} not found")));
    }

    let accepted = request.items.len();
    if !state.scheduler.append_items_to_input(&id, request.items) {
        return Err(ApiError::conflict(format!(
            "input {id} does not accept appended items"
        )));
    }

    Ok(Json(AppendItemsResponse { id, accepted }))
}

//! API route modules.

pub mod health;
pub mod inputs;
pub mod jobs;

use axum::Router;

use crate::api::server::AppState;

/// Assemble the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/health", health::router())
        .nest("/jobs", jobs::router())
        .nest("/inputs", inputs::router())
}

//! Top-level router assembly.

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

use super::handlers::execution::execution_routes;

/// Build the application router: versioned API plus a health probe.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", execution_routes())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

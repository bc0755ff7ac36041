//! axum router: the five-route contract plus `/healthz`, generalized from
//! the teacher's `serve/src/app.rs` single-route `Router::new().route(...)`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::routes;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/v1/sessions/:id/knowledge-qa", post(routes::knowledge_qa))
        .route("/api/v1/sessions/:id/agent-qa", post(routes::agent_qa))
        .route("/api/v1/sessions/:id/stop", post(routes::stop))
        .route("/api/v1/sessions/continue-stream/:id", get(routes::continue_stream))
        .route("/api/v1/knowledge-search", post(routes::knowledge_search))
        .with_state(state)
}

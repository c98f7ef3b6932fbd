//! Health check endpoint.

use crate::controller::AuthPhase;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Always 200 while the process serves requests. Reports the gateway in use
/// and whether the initial session lookup has settled.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let phase = state.controller.snapshot().phase();
    Json(json!({
        "status": "ok",
        "gateway": state.gateway.get_name(),
        "ready": phase != AuthPhase::Loading,
    }))
}

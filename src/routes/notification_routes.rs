//! Notification inbox of the signed-in user.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::guard::AccessGuard;
use crate::models::Notification;
use crate::state::AppState;
use crate::utils::http_helpers::{guarded, HTTPError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
}

#[derive(Serialize)]
struct Inbox {
    unread_count: usize,
    notifications: Vec<Notification>,
}

fn require_login(state: &AppState) -> Result<(), HTTPError> {
    let snapshot = state.controller.snapshot();
    guarded(AccessGuard::authenticated().check(&snapshot, ()))
}

async fn list(State(state): State<AppState>) -> Result<Json<Inbox>, HTTPError> {
    require_login(&state)?;
    Ok(Json(Inbox {
        unread_count: state.notifications.unread_count().await,
        notifications: state.notifications.list().await,
    }))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Notification>, HTTPError> {
    require_login(&state)?;
    let notification = state.notifications.mark_read(id).await?;
    Ok(Json(notification))
}

async fn mark_all_read(State(state): State<AppState>) -> Result<Json<Value>, HTTPError> {
    require_login(&state)?;
    let marked = state.notifications.mark_all_read().await;
    Ok(Json(json!({ "marked": marked })))
}

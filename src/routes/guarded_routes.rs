//! Pages behind the access guard.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::guard::AccessGuard;
use crate::state::AppState;
use crate::utils::http_helpers::{guarded, HTTPError};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/admin", get(admin))
}

#[derive(Serialize)]
struct PageView {
    page: &'static str,
    user_id: Option<String>,
    email: Option<String>,
    is_admin: bool,
    unread_notifications: usize,
}

async fn page(state: &AppState, name: &'static str) -> PageView {
    let snapshot = state.controller.snapshot();
    PageView {
        page: name,
        user_id: snapshot.user.as_ref().map(|u| u.user_id.clone()),
        email: snapshot.user.and_then(|u| u.email),
        is_admin: snapshot.is_admin,
        unread_notifications: state.notifications.unread_count().await,
    }
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<PageView>, HTTPError> {
    let snapshot = state.controller.snapshot();
    let name = guarded(AccessGuard::authenticated().check(&snapshot, "dashboard"))?;
    Ok(Json(page(&state, name).await))
}

async fn admin(State(state): State<AppState>) -> Result<Json<PageView>, HTTPError> {
    let snapshot = state.controller.snapshot();
    let name = guarded(AccessGuard::admin().check(&snapshot, "admin"))?;
    Ok(Json(page(&state, name).await))
}

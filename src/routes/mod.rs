//! HTTP route definitions and handlers.
//!
//! Routes are grouped by concern: the auth operations, the guarded pages,
//! the notification inbox, plus health and metrics.

mod auth_routes;
mod guarded_routes;
mod health_routes;
mod metrics_routes;
mod notification_routes;

use crate::state::AppState;
use axum::Router;

/// Creates the application router with all routes attached to `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_routes::routes())
        .merge(guarded_routes::routes())
        .merge(notification_routes::routes())
        .merge(health_routes::routes())
        .merge(metrics_routes::routes())
        .with_state(state)
}

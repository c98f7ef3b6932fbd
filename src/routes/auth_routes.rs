//! Auth operation endpoints.
//!
//! Every handler answers with the resulting auth state so clients can
//! re-render from a single snapshot.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::controller::{AuthPhase, AuthState};
use crate::models::{ResendStatus, Role};
use crate::state::AppState;
use crate::utils::http_helpers::HTTPError;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/session", get(session))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/resend-confirmation", post(resend_confirmation))
        .route("/auth/refresh-admin", post(refresh_admin))
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct SignUpRequest {
    email: String,
    password: String,
    #[serde(default)]
    role: Role,
}

#[derive(Deserialize)]
struct ResendRequest {
    email: String,
    password: Option<String>,
}

#[derive(Serialize)]
struct SessionView {
    phase: AuthPhase,
    #[serde(flatten)]
    state: AuthState,
}

impl From<AuthState> for SessionView {
    fn from(state: AuthState) -> Self {
        SessionView {
            phase: state.phase(),
            state,
        }
    }
}

#[derive(Serialize)]
struct SignUpView {
    confirmation_required: bool,
    #[serde(flatten)]
    session: SessionView,
}

async fn session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.controller.snapshot().into())
}

async fn sign_in(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SessionView>, HTTPError> {
    state
        .controller
        .sign_in(&credentials.email, &credentials.password)
        .await?;
    Ok(Json(state.controller.snapshot().into()))
}

async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> Result<Json<SignUpView>, HTTPError> {
    let session = state
        .controller
        .sign_up(&request.email, &request.password, request.role)
        .await?;
    Ok(Json(SignUpView {
        confirmation_required: session.is_none(),
        session: state.controller.snapshot().into(),
    }))
}

async fn sign_out(State(state): State<AppState>) -> Result<Json<SessionView>, HTTPError> {
    state.controller.sign_out().await?;
    Ok(Json(state.controller.snapshot().into()))
}

async fn resend_confirmation(
    State(state): State<AppState>,
    Json(request): Json<ResendRequest>,
) -> Result<Json<ResendStatus>, HTTPError> {
    let status = state
        .controller
        .resend_confirmation(&request.email, request.password.as_deref())
        .await?;
    Ok(Json(status))
}

async fn refresh_admin(State(state): State<AppState>) -> Json<SessionView> {
    state.controller.refresh_admin().await;
    Json(state.controller.snapshot().into())
}

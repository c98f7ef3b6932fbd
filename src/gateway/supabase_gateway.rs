use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{RequestBuilder, Response, StatusCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::base::{IdentityGateway, EVENT_CHANNEL_CAPACITY};
use crate::error::AuthError;
use crate::models::{AuthEvent, ResendStatus, Role, Session};

/// Refresh the access token when it expires within this many seconds.
/// Clamped to half the token lifetime for short-lived tokens.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Config for a Supabase project (GoTrue auth + PostgREST RPCs).
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct SupabaseGatewayConfig {
    pub name: String,
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anon key sent as `apikey` on every request.
    pub anon_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_in_ms: u64,
    /// RPC answering whether the caller holds the admin role.
    #[serde(default = "default_admin_rpc")]
    pub admin_rpc: String,
    /// RPC promoting the designated account to admin.
    #[serde(default = "default_bootstrap_rpc")]
    pub bootstrap_rpc: String,
}

fn default_request_timeout() -> u64 {
    15000
}

fn default_admin_rpc() -> String {
    "is_admin".to_string()
}

fn default_bootstrap_rpc() -> String {
    "ensure_designated_admin".to_string()
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: GoTrueUser,
}

#[derive(Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token
            .expires_at
            .or_else(|| token.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            user_id: token.user.id,
            email: token.user.email,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
        }
    }
}

/// Maps a GoTrue/PostgREST error body onto the auth error taxonomy.
///
/// GoTrue reports a machine code in `error_code` (newer) or `code`, and the
/// message in `msg`, `error_description` or `message` depending on the endpoint.
pub fn classify_error(status: StatusCode, body: &Value) -> AuthError {
    let code = ["error_code", "code", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or("");
    let message = ["msg", "error_description", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Identity service returned HTTP {}", status.as_u16()));

    match code {
        "invalid_credentials" | "invalid_grant" if !message.to_lowercase().contains("confirm") => {
            return AuthError::InvalidCredentials
        }
        "email_not_confirmed" => return AuthError::EmailNotConfirmed,
        "user_already_exists" | "email_exists" => return AuthError::AccountExists,
        _ => {}
    }

    let lowered = message.to_lowercase();
    if lowered.contains("email not confirmed") {
        AuthError::EmailNotConfirmed
    } else if lowered.contains("invalid login credentials") {
        AuthError::InvalidCredentials
    } else if lowered.contains("already registered") {
        AuthError::AccountExists
    } else if status == StatusCode::UNPROCESSABLE_ENTITY || code == "validation_failed" {
        AuthError::Validation(message)
    } else {
        AuthError::Unknown(message)
    }
}

/// Identity gateway backed by a Supabase project.
///
/// The session is cached in memory; persistence across restarts is left to
/// the backend.
pub struct SupabaseGateway {
    config: SupabaseGatewayConfig,
    client: reqwest::Client,
    session: Mutex<Option<CachedSession>>,
    events: broadcast::Sender<AuthEvent>,
}

struct CachedSession {
    session: Session,
    /// Seconds between issue and expiry, when the backend reported one.
    lifetime_secs: Option<i64>,
}

impl CachedSession {
    fn new(session: Session) -> Self {
        let lifetime_secs = session
            .expires_at
            .map(|at| at - Utc::now().timestamp());
        CachedSession {
            session,
            lifetime_secs,
        }
    }

    fn needs_refresh(&self, now: i64) -> bool {
        let margin = match self.lifetime_secs {
            Some(lifetime) => REFRESH_MARGIN_SECS.min(lifetime / 2),
            None => REFRESH_MARGIN_SECS,
        };
        self.session
            .expires_at
            .is_some_and(|at| at - margin <= now)
    }
}

impl SupabaseGateway {
    pub fn new(config: &SupabaseGatewayConfig) -> Self {
        info!(
            "Creating SupabaseGateway '{}' for '{}'",
            config.name, config.url
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_in_ms))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config: config.clone(),
            client,
            session: Mutex::new(None),
            events,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn rpc_url(&self, function: &str) -> String {
        format!(
            "{}/rest/v1/rpc/{}",
            self.config.url.trim_end_matches('/'),
            function
        )
    }

    /// Attaches the project key and, when given, the user's bearer token.
    fn with_keys(&self, request: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token.unwrap_or(&self.config.anon_key))
    }

    /// Reads the body and turns non-2xx responses into classified errors.
    async fn read_json(response: Response) -> Result<Value, AuthError> {
        let status = response.status();
        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        if status.is_success() {
            Ok(body)
        } else {
            debug!("Identity service answered {}: {}", status, body);
            Err(classify_error(status, &body))
        }
    }

    fn parse_session(body: Value) -> Result<Session, AuthError> {
        serde_json::from_value::<TokenResponse>(body)
            .map(Session::from)
            .map_err(|e| AuthError::Network(format!("Unexpected token response: {}", e)))
    }

    async fn store_session(&self, session: Session, event: AuthEvent) {
        *self.session.lock().await = Some(CachedSession::new(session));
        let _ = self.events.send(event);
    }

    /// Exchanges the refresh token for a new access token.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .with_keys(
                self.client
                    .post(self.auth_url("token"))
                    .query(&[("grant_type", "refresh_token")]),
                None,
            )
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let session = Self::parse_session(Self::read_json(response).await?)?;
        self.store_session(session.clone(), AuthEvent::TokenRefreshed(session.clone()))
            .await;
        debug!("Refreshed session for user '{}'", session.user_id);
        Ok(session)
    }

    async fn current_access_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|cached| cached.session.access_token.clone())
    }

    async fn call_rpc(&self, function: &str, access_token: &str) -> Result<Value, AuthError> {
        let response = self
            .with_keys(self.client.post(self.rpc_url(function)), Some(access_token))
            .json(&json!({}))
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl IdentityGateway for SupabaseGateway {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn get_type(&self) -> &str {
        "supabase"
    }

    /// Returns the cached session, refreshing it first when it is about to expire.
    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        let (session, expiring) = {
            let cached = self.session.lock().await;
            let Some(cached) = cached.as_ref() else {
                return Ok(None);
            };
            (
                cached.session.clone(),
                cached.needs_refresh(Utc::now().timestamp()),
            )
        };
        if expiring {
            if let Some(refresh_token) = session.refresh_token.as_deref() {
                return self.refresh_session(refresh_token).await.map(Some);
            }
        }
        Ok(Some(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        debug!("Password sign-in for '{}'", email);
        let response = self
            .with_keys(
                self.client
                    .post(self.auth_url("token"))
                    .query(&[("grant_type", "password")]),
                None,
            )
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session = Self::parse_session(Self::read_json(response).await?)?;
        self.store_session(session.clone(), AuthEvent::SignedIn(session.clone()))
            .await;
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<Session>, AuthError> {
        debug!("Sign-up for '{}' as {}", email, role.as_str());
        let response = self
            .with_keys(self.client.post(self.auth_url("signup")), None)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "role": role.as_str() },
            }))
            .send()
            .await?;
        let body = Self::read_json(response).await?;

        // Without auto-confirm GoTrue answers with the bare user and no tokens.
        if body.get("access_token").is_none() {
            return Ok(None);
        }
        let session = Self::parse_session(body)?;
        self.store_session(session.clone(), AuthEvent::SignedIn(session.clone()))
            .await;
        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(access_token) = self.current_access_token().await else {
            return Ok(());
        };
        let response = self
            .with_keys(self.client.post(self.auth_url("logout")), Some(&access_token))
            .send()
            .await?;
        match response.status() {
            // The token is already expired, revoked or unknown server-side.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!("Logout answered {}, dropping local session", response.status());
            }
            _ => {
                Self::read_json(response).await?;
            }
        }

        *self.session.lock().await = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn is_current_user_admin(&self) -> Result<bool, AuthError> {
        let Some(access_token) = self.current_access_token().await else {
            return Ok(false);
        };
        match self.call_rpc(&self.config.admin_rpc, &access_token).await? {
            Value::Bool(is_admin) => Ok(is_admin),
            Value::Null => Ok(false),
            other => Err(AuthError::Unknown(format!(
                "Unexpected answer from {}: {}",
                self.config.admin_rpc, other
            ))),
        }
    }

    async fn ensure_designated_admin(&self) -> Result<(), AuthError> {
        let Some(access_token) = self.current_access_token().await else {
            return Ok(());
        };
        self.call_rpc(&self.config.bootstrap_rpc, &access_token)
            .await
            .map(|_| ())
    }

    /// GoTrue only needs the address to resend; the password is not sent.
    async fn resend_confirmation(
        &self,
        email: &str,
        _password: Option<&str>,
    ) -> Result<ResendStatus, AuthError> {
        let response = self
            .with_keys(self.client.post(self.auth_url("resend")), None)
            .json(&json!({ "type": "signup", "email": email }))
            .send()
            .await?;
        Self::read_json(response).await?;
        Ok(ResendStatus::new(
            "sent",
            format!("Confirmation email sent to {}", email),
        ))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

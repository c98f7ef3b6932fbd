use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The currently authenticated principal, as issued by the identity gateway.
///
/// Tokens are kept for talking back to the gateway but never serialized into
/// responses or logs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the access token is no longer valid.
    pub expires_at: Option<i64>,
}

impl Session {
    /// Two sessions are the same login when they belong to the same user and carry the same token.
    pub fn same_login(&self, other: &Session) -> bool {
        self.user_id == other.user_id && self.access_token == other.access_token
    }
}

/// Marketplace role chosen at registration.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Rents equipment.
    #[default]
    Client,
    /// Lists equipment for rent.
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Provider => "provider",
        }
    }
}

/// Out-of-band session changes published by a gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
        }
    }
}

/// Outcome of a resend-confirmation request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResendStatus {
    pub status: String,
    pub detail: String,
}

impl ResendStatus {
    pub fn new(status: impl Into<String>, detail: impl Into<String>) -> Self {
        ResendStatus {
            status: status.into(),
            detail: detail.into(),
        }
    }
}

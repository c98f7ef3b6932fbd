use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use super::memory_gateway::{MemoryGateway, MemoryGatewayConfig};
use super::supabase_gateway::{SupabaseGateway, SupabaseGatewayConfig};
use crate::error::AuthError;
use crate::models::{AuthEvent, ResendStatus, Role, Session};

/// Capacity of the auth-event channel each gateway owns.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Selects the identity backend.
#[derive(Deserialize, Serialize, JsonSchema, Debug)]
#[serde(tag = "type")]
pub enum GatewayConfig {
    #[serde(rename = "supabase")]
    Supabase(SupabaseGatewayConfig),
    #[serde(rename = "memory")]
    Memory(MemoryGatewayConfig),
}

/// The external identity service: credential checks, session issuance and
/// role storage all happen behind this trait.
///
/// Every method may suspend on the network and none of them can be
/// cancelled server-side once sent.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    fn get_name(&self) -> &str;
    fn get_type(&self) -> &str;

    async fn get_current_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Creates an account. Returns `None` when the backend holds the session
    /// back until the email address is confirmed.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<Session>, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn is_current_user_admin(&self) -> Result<bool, AuthError>;

    /// Promotes the one pre-designated account to admin if it is not already.
    /// Idempotent; safe to call after every login.
    async fn ensure_designated_admin(&self) -> Result<(), AuthError>;

    async fn resend_confirmation(
        &self,
        email: &str,
        password: Option<&str>,
    ) -> Result<ResendStatus, AuthError>;

    /// Registers a listener for out-of-band session changes. Dropping the
    /// receiver unregisters it.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Create an identity gateway from a given config.
pub fn create_gateway(config: &GatewayConfig) -> Arc<dyn IdentityGateway> {
    let gateway: Arc<dyn IdentityGateway> = match config {
        GatewayConfig::Supabase(cfg) => Arc::new(SupabaseGateway::new(cfg)),
        GatewayConfig::Memory(cfg) => Arc::new(MemoryGateway::new(cfg)),
    };
    info!(
        "Using identity gateway '{}' of type '{}'",
        gateway.get_name(),
        gateway.get_type()
    );
    gateway
}

/// Lowercases and trims an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

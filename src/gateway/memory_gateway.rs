use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use super::base::{normalize_email, IdentityGateway, EVENT_CHANNEL_CAPACITY};
use crate::error::AuthError;
use crate::models::{AuthEvent, ResendStatus, Role, Session};

const SESSION_LIFETIME_SECS: i64 = 3600;
const MIN_PASSWORD_LEN: usize = 6;

/// Config for an in-process identity backend, used for local development and tests.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct MemoryGatewayConfig {
    /// A friendly name for logs.
    pub name: String,
    /// The account promoted to admin by the bootstrap convergence step.
    pub designated_admin: Option<String>,
    /// When true, new sign-ups must confirm their email before signing in.
    #[serde(default = "default_require_confirmation")]
    pub require_confirmation: bool,
    #[serde(default)]
    pub users: Vec<MemoryUserEntry>,
}

fn default_require_confirmation() -> bool {
    true
}

/// A pre-registered account.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct MemoryUserEntry {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_confirmed")]
    pub confirmed: bool,
    #[serde(default)]
    pub admin: bool,
}

fn default_confirmed() -> bool {
    true
}

#[derive(Debug, Clone)]
struct Account {
    user_id: String,
    password: String,
    role: Role,
    confirmed: bool,
    admin: bool,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    current: Option<(String, Session)>,
    resent_to: Vec<String>,
}

/// Identity gateway keeping accounts and the current session in memory.
pub struct MemoryGateway {
    config: MemoryGatewayConfig,
    state: Mutex<MemoryState>,
    events: broadcast::Sender<AuthEvent>,
}

impl MemoryGateway {
    pub fn new(config: &MemoryGatewayConfig) -> Self {
        info!(
            "Creating MemoryGateway '{}' with {} account(s)",
            config.name,
            config.users.len()
        );
        let accounts = config
            .users
            .iter()
            .map(|entry| {
                (
                    normalize_email(&entry.email),
                    Account {
                        user_id: Uuid::new_v4().to_string(),
                        password: entry.password.clone(),
                        role: entry.role,
                        confirmed: entry.confirmed,
                        admin: entry.admin,
                    },
                )
            })
            .collect();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            config: config.clone(),
            state: Mutex::new(MemoryState {
                accounts,
                ..Default::default()
            }),
            events,
        }
    }

    /// Publishes an event as if it came from another tab or a token refresh.
    /// A `SignedIn` event also becomes the current session.
    pub async fn emit(&self, event: AuthEvent) {
        {
            let mut state = self.state.lock().await;
            match &event {
                AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                    let email = session.email.as_deref().map(normalize_email);
                    state.current = Some((email.unwrap_or_default(), session.clone()));
                }
                AuthEvent::SignedOut => state.current = None,
            }
        }
        let _ = self.events.send(event);
    }

    /// Publishes an event without touching the current session, like a
    /// notification delivered after the state it describes has moved on.
    pub fn replay(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    /// Marks an account's email as verified.
    pub async fn confirm_email(&self, email: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(&normalize_email(email)) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Admin flag of an account, or `None` if it does not exist.
    pub async fn is_admin(&self, email: &str) -> Option<bool> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&normalize_email(email))
            .map(|account| account.admin)
    }

    /// Role recorded for an account at registration.
    pub async fn role_of(&self, email: &str) -> Option<Role> {
        let state = self.state.lock().await;
        state
            .accounts
            .get(&normalize_email(email))
            .map(|account| account.role)
    }

    /// Emails that confirmation messages were (re)sent to, oldest first.
    pub async fn resent_to(&self) -> Vec<String> {
        self.state.lock().await.resent_to.clone()
    }

    fn issue_session(email: &str, account: &Account) -> Session {
        Session {
            user_id: account.user_id.clone(),
            email: Some(email.to_string()),
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_at: Some(Utc::now().timestamp() + SESSION_LIFETIME_SECS),
        }
    }
}

#[async_trait]
impl IdentityGateway for MemoryGateway {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    fn get_type(&self) -> &str {
        "memory"
    }

    async fn get_current_session(&self) -> Result<Option<Session>, AuthError> {
        let state = self.state.lock().await;
        Ok(state.current.as_ref().map(|(_, session)| session.clone()))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        let session = {
            let mut state = self.state.lock().await;
            let account = match state.accounts.get(&email) {
                Some(account) if account.password == password => account,
                _ => {
                    debug!("Memory sign-in rejected for '{}'", email);
                    return Err(AuthError::InvalidCredentials);
                }
            };
            if !account.confirmed {
                return Err(AuthError::EmailNotConfirmed);
            }
            let session = Self::issue_session(&email, account);
            state.current = Some((email, session.clone()));
            session
        };
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<Session>, AuthError> {
        let email = normalize_email(email);
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password should be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        {
            let mut state = self.state.lock().await;
            if state.accounts.contains_key(&email) {
                return Err(AuthError::AccountExists);
            }
            state.accounts.insert(
                email.clone(),
                Account {
                    user_id: Uuid::new_v4().to_string(),
                    password: password.to_string(),
                    role,
                    confirmed: !self.config.require_confirmation,
                    admin: false,
                },
            );
            info!("Registered '{}' as {}", email, role.as_str());
        }

        if self.config.require_confirmation {
            return Ok(None);
        }
        self.sign_in(&email, password).await.map(Some)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let had_session = self.state.lock().await.current.take().is_some();
        if had_session {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    async fn is_current_user_admin(&self) -> Result<bool, AuthError> {
        let state = self.state.lock().await;
        let Some((email, _)) = state.current.as_ref() else {
            return Ok(false);
        };
        Ok(state
            .accounts
            .get(email)
            .map(|account| account.admin)
            .unwrap_or(false))
    }

    async fn ensure_designated_admin(&self) -> Result<(), AuthError> {
        let Some(designated) = self.config.designated_admin.as_deref() else {
            return Ok(());
        };
        let designated = normalize_email(designated);
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(&designated) {
            Some(account) if !account.admin => {
                account.admin = true;
                info!("Promoted designated admin '{}'", designated);
            }
            Some(_) => debug!("Designated admin '{}' already promoted", designated),
            None => debug!("Designated admin '{}' has not registered yet", designated),
        }
        Ok(())
    }

    async fn resend_confirmation(
        &self,
        email: &str,
        password: Option<&str>,
    ) -> Result<ResendStatus, AuthError> {
        let email = normalize_email(email);
        let mut state = self.state.lock().await;
        let confirmed = match state.accounts.get(&email) {
            Some(account) => {
                if password.is_some_and(|p| p != account.password) {
                    return Err(AuthError::InvalidCredentials);
                }
                account.confirmed
            }
            // Unknown addresses get the same answer as known ones.
            None => false,
        };
        if confirmed {
            return Ok(ResendStatus::new(
                "already_confirmed",
                format!("{} is already confirmed, you can sign in", email),
            ));
        }
        state.resent_to.push(email.clone());
        Ok(ResendStatus::new(
            "sent",
            format!("Confirmation email sent to {}", email),
        ))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> MemoryGatewayConfig {
        MemoryGatewayConfig {
            name: "TestMemory".to_string(),
            designated_admin: Some("Owner@Rigs.test".to_string()),
            require_confirmation: true,
            users: vec![
                MemoryUserEntry {
                    email: "owner@rigs.test".to_string(),
                    password: "excavator".to_string(),
                    role: Role::Provider,
                    confirmed: true,
                    admin: false,
                },
                MemoryUserEntry {
                    email: "renter@rigs.test".to_string(),
                    password: "bulldozer".to_string(),
                    role: Role::Client,
                    confirmed: true,
                    admin: false,
                },
                MemoryUserEntry {
                    email: "pending@rigs.test".to_string(),
                    password: "crane123".to_string(),
                    role: Role::Client,
                    confirmed: false,
                    admin: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_sign_in_valid_credentials() {
        let gateway = MemoryGateway::new(&create_test_config());

        let session = gateway.sign_in("Renter@rigs.test ", "bulldozer").await.unwrap();

        assert_eq!(session.email.as_deref(), Some("renter@rigs.test"));
        assert!(!session.access_token.is_empty());
        assert_eq!(gateway.get_current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_sign_in_wrong_password() {
        let gateway = MemoryGateway::new(&create_test_config());

        let result = gateway.sign_in("renter@rigs.test", "wrong").await;

        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
        assert_eq!(gateway.get_current_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sign_in_unconfirmed_email() {
        let gateway = MemoryGateway::new(&create_test_config());

        let result = gateway.sign_in("pending@rigs.test", "crane123").await;
        assert_eq!(result.unwrap_err(), AuthError::EmailNotConfirmed);

        assert!(gateway.confirm_email("pending@rigs.test").await);
        assert!(gateway.sign_in("pending@rigs.test", "crane123").await.is_ok());
    }

    #[tokio::test]
    async fn test_sign_in_and_out_publish_events() {
        let gateway = MemoryGateway::new(&create_test_config());
        let mut events = gateway.subscribe();

        let session = gateway.sign_in("renter@rigs.test", "bulldozer").await.unwrap();
        gateway.sign_out().await.unwrap();

        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(session));
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_quiet() {
        let gateway = MemoryGateway::new(&create_test_config());
        let mut events = gateway.subscribe();

        gateway.sign_out().await.unwrap();

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_designated_admin_bootstrap_is_idempotent() {
        let gateway = MemoryGateway::new(&create_test_config());
        assert_eq!(gateway.is_admin("owner@rigs.test").await, Some(false));

        gateway.ensure_designated_admin().await.unwrap();
        assert_eq!(gateway.is_admin("owner@rigs.test").await, Some(true));

        gateway.ensure_designated_admin().await.unwrap();
        gateway.ensure_designated_admin().await.unwrap();
        assert_eq!(gateway.is_admin("owner@rigs.test").await, Some(true));
        assert_eq!(gateway.is_admin("renter@rigs.test").await, Some(false));
    }

    #[tokio::test]
    async fn test_admin_check_follows_current_session() {
        let gateway = MemoryGateway::new(&create_test_config());
        gateway.ensure_designated_admin().await.unwrap();

        assert!(!gateway.is_current_user_admin().await.unwrap());
        gateway.sign_in("owner@rigs.test", "excavator").await.unwrap();
        assert!(gateway.is_current_user_admin().await.unwrap());
        gateway.sign_in("renter@rigs.test", "bulldozer").await.unwrap();
        assert!(!gateway.is_current_user_admin().await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_up_requires_confirmation() {
        let gateway = MemoryGateway::new(&create_test_config());

        let session = gateway
            .sign_up("new@rigs.test", "loader99", Role::Provider)
            .await
            .unwrap();

        assert!(session.is_none());
        assert_eq!(gateway.role_of("new@rigs.test").await, Some(Role::Provider));
        assert_eq!(
            gateway.sign_in("new@rigs.test", "loader99").await.unwrap_err(),
            AuthError::EmailNotConfirmed
        );
    }

    #[tokio::test]
    async fn test_sign_up_without_confirmation_signs_in() {
        let mut config = create_test_config();
        config.require_confirmation = false;
        let gateway = MemoryGateway::new(&config);

        let session = gateway
            .sign_up("new@rigs.test", "loader99", Role::Client)
            .await
            .unwrap();

        assert!(session.is_some());
        assert_eq!(gateway.get_current_session().await.unwrap(), session);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_existing_and_weak() {
        let gateway = MemoryGateway::new(&create_test_config());

        assert_eq!(
            gateway
                .sign_up("RENTER@rigs.test", "whatever", Role::Client)
                .await
                .unwrap_err(),
            AuthError::AccountExists
        );
        assert!(matches!(
            gateway.sign_up("x@rigs.test", "123", Role::Client).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_resend_confirmation() {
        let gateway = MemoryGateway::new(&create_test_config());

        let status = gateway
            .resend_confirmation("pending@rigs.test", None)
            .await
            .unwrap();
        assert_eq!(status.status, "sent");

        let status = gateway
            .resend_confirmation("renter@rigs.test", None)
            .await
            .unwrap();
        assert_eq!(status.status, "already_confirmed");

        let err = gateway
            .resend_confirmation("pending@rigs.test", Some("nope"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);

        assert_eq!(gateway.resent_to().await, vec!["pending@rigs.test"]);
    }
}

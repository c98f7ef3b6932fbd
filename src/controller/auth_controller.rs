use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::state::AuthState;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::gateway::IdentityGateway;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{AuthEvent, ResendStatus, Role, Session};
use crate::utils::timeout::{deadline_from_ms, race};

/// Owns the process-wide `AuthState` and routes every mutation through a
/// fixed set of operations.
///
/// Operations are serialized: a second sign-in fired while the first is
/// still waiting on the gateway queues behind it instead of racing it.
/// Consumers read snapshots via [`AuthController::snapshot`] or follow
/// changes through [`AuthController::watch`].
pub struct AuthController {
    inner: Arc<ControllerInner>,
    listener: AbortHandle,
}

struct ControllerInner {
    gateway: Arc<dyn IdentityGateway>,
    state: watch::Sender<AuthState>,
    operations: Mutex<()>,
    admin_check_timeout: Duration,
    metrics: Metrics,
}

impl AuthController {
    /// Creates the controller, registers the session-change listener and
    /// runs the initial session lookup. Returns once that lookup settled.
    pub async fn start(
        gateway: Arc<dyn IdentityGateway>,
        config: &AuthConfig,
        metrics: Metrics,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::initial());
        let inner = Arc::new(ControllerInner {
            gateway,
            state,
            operations: Mutex::new(()),
            admin_check_timeout: deadline_from_ms(config.admin_check_timeout_in_ms),
            metrics,
        });

        // Subscribe before the lookup so no change can slip in between.
        let events = inner.gateway.subscribe();
        let listener = tokio::spawn(listen(Arc::downgrade(&inner), events)).abort_handle();

        let controller = AuthController { inner, listener };
        controller.bootstrap().await;
        controller
    }

    pub fn snapshot(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// A receiver that observes every state change from now on.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    async fn bootstrap(&self) {
        let inner = &self.inner;
        // Failures are recorded in the state; bootstrap itself never fails.
        let _ = inner
            .run("bootstrap", false, move || async move {
                match inner.gateway.get_current_session().await {
                    Ok(Some(session)) => {
                        info!("Restored session for user '{}'", session.user_id);
                        inner.state.send_modify(|s| s.user = Some(session));
                        let is_admin = inner.lookup_admin().await.unwrap_or(false);
                        inner.set_admin(is_admin);
                        Ok(())
                    }
                    Ok(None) => {
                        debug!("No existing session");
                        inner.clear_user();
                        Ok(())
                    }
                    Err(e) => {
                        inner.clear_user();
                        Err(e)
                    }
                }
            })
            .await;
    }

    /// Password sign-in. On failure the message is stored in `error` and the
    /// error is returned so the caller can branch on it.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let inner = &self.inner;
        inner
            .run("sign_in", true, move || async move {
                validate_credentials(email, password)?;
                let previous = inner.state.borrow().clone();
                let session = inner.gateway.sign_in(email, password).await?;
                info!("User '{}' signed in", session.user_id);
                inner.establish(session.clone(), &previous).await;
                Ok(session)
            })
            .await
    }

    /// Registers a new account with the given marketplace role. Returns the
    /// session when the backend signs the user in straight away, `None` when
    /// the email address must be confirmed first.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<Option<Session>, AuthError> {
        let inner = &self.inner;
        inner
            .run("sign_up", true, move || async move {
                validate_credentials(email, password)?;
                let previous = inner.state.borrow().clone();
                let session = inner.gateway.sign_up(email, password, role).await?;
                match &session {
                    Some(session) => {
                        info!("User '{}' registered and signed in", session.user_id);
                        inner.establish(session.clone(), &previous).await;
                    }
                    None => info!("Registration for '{}' awaits email confirmation", email),
                }
                Ok(session)
            })
            .await
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let inner = &self.inner;
        inner
            .run("sign_out", false, move || async move {
                inner.gateway.sign_out().await?;
                inner.clear_user();
                info!("Signed out");
                Ok(())
            })
            .await
    }

    /// Asks the backend to send the confirmation email again. Leaves the
    /// signed-in user and admin flag untouched.
    pub async fn resend_confirmation(
        &self,
        email: &str,
        password: Option<&str>,
    ) -> Result<ResendStatus, AuthError> {
        let inner = &self.inner;
        inner
            .run("resend_confirmation", false, move || async move {
                validate_email(email)?;
                inner.gateway.resend_confirmation(email, password).await
            })
            .await
    }

    /// Re-reads the admin flag for the current user. Keeps the cached value
    /// if the lookup fails or times out.
    pub async fn refresh_admin(&self) -> bool {
        let _op = self.inner.operations.lock().await;
        let current = self.snapshot();
        if current.user.is_none() {
            return false;
        }
        let is_admin = self.inner.lookup_admin().await.unwrap_or(current.is_admin);
        self.inner.set_admin(is_admin);
        self.snapshot().is_admin
    }

    /// Stops reacting to gateway events. Also happens on drop.
    pub fn shutdown(&self) {
        if !self.listener.is_finished() {
            debug!("Unregistering session-change listener");
        }
        self.listener.abort();
    }
}

impl Drop for AuthController {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

impl ControllerInner {
    /// Common envelope of every operation: serialize, flag loading, clear
    /// the previous error, record the outcome.
    async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        resets_confirmation: bool,
        body: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AuthError>>,
    {
        let started = Instant::now();
        let _op = self.operations.lock().await;
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
            if resets_confirmation {
                s.email_not_confirmed = false;
            }
        });

        let result = body().await;

        self.state.send_modify(|s| {
            if let Err(e) = &result {
                s.error = Some(e.to_string());
                if e.is_email_not_confirmed() {
                    s.email_not_confirmed = true;
                }
            }
            s.loading = false;
        });

        match &result {
            Ok(_) => self.metrics.record_operation(operation, "ok"),
            Err(e) => {
                warn!("{} failed: {}", operation, e);
                self.metrics.record_operation(operation, e.kind());
            }
        }
        self.metrics
            .record_operation_duration(operation, started.elapsed().as_secs_f64());
        result
    }

    /// Stores a fresh session, runs the designated-admin convergence step and
    /// resolves the admin flag.
    ///
    /// If the privilege lookup fails or times out, the flag held immediately
    /// before the operation is kept. Signing out resets it to `false`.
    async fn establish(&self, session: Session, previous: &AuthState) {
        let fallback = previous.is_admin;

        self.state.send_modify(|s| {
            s.user = Some(session);
            s.is_admin = fallback;
        });

        match race(self.gateway.ensure_designated_admin(), self.admin_check_timeout).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Designated admin bootstrap failed: {}", e),
            Err(e) => warn!("Designated admin bootstrap abandoned: {}", e),
        }

        let is_admin = match self.lookup_admin().await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                warn!("Keeping cached admin flag ({}) after: {}", fallback, e);
                fallback
            }
        };
        self.set_admin(is_admin);
    }

    /// The admin-privilege lookup, bounded by the configured deadline.
    async fn lookup_admin(&self) -> Result<bool, AuthError> {
        let result = match race(self.gateway.is_current_user_admin(), self.admin_check_timeout)
            .await
        {
            Ok(answer) => answer,
            Err(elapsed) => Err(elapsed.into()),
        };
        let label = match &result {
            Ok(_) => "ok",
            Err(AuthError::Timeout) => "timeout",
            Err(_) => "error",
        };
        self.metrics.record_admin_check(label);
        result
    }

    fn set_admin(&self, is_admin: bool) {
        self.state
            .send_modify(|s| s.is_admin = s.user.is_some() && is_admin);
    }

    fn clear_user(&self) {
        self.state.send_modify(|s| {
            s.user = None;
            s.is_admin = false;
            s.email_not_confirmed = false;
        });
    }

    /// Applies a change reported by the gateway outside of our own operations.
    /// Events already superseded by the gateway's current session are dropped.
    async fn apply_event(&self, event: AuthEvent) {
        let _op = self.operations.lock().await;
        debug!("Received auth event {}", event.name());
        let current = match self.gateway.get_current_session().await {
            Ok(current) => current,
            Err(e) => {
                warn!("Could not verify {} event: {}", event.name(), e);
                return;
            }
        };
        let held = self.state.borrow().clone();

        match event {
            AuthEvent::SignedIn(session) => {
                if !current.as_ref().is_some_and(|c| c.same_login(&session)) {
                    debug!("Ignoring stale sign-in event");
                    return;
                }
                if held.user.as_ref().is_some_and(|u| u.same_login(&session)) {
                    return;
                }
                info!("Session for '{}' established elsewhere", session.user_id);
                self.establish(session, &held).await;
            }
            AuthEvent::TokenRefreshed(session) => {
                if !current.as_ref().is_some_and(|c| c.same_login(&session)) {
                    debug!("Ignoring stale token refresh");
                    return;
                }
                match held.user.as_ref() {
                    Some(user) if user.user_id == session.user_id => {
                        self.state.send_modify(|s| s.user = Some(session));
                    }
                    _ => self.establish(session, &held).await,
                }
            }
            AuthEvent::SignedOut => {
                if current.is_some() {
                    debug!("Ignoring stale sign-out event");
                    return;
                }
                if held.user.is_some() {
                    info!("Session ended elsewhere");
                    self.clear_user();
                }
            }
        }
    }

    /// Re-reads the gateway session after missed events.
    async fn resync(&self) {
        match self.gateway.get_current_session().await {
            Ok(Some(session)) => self.apply_event(AuthEvent::SignedIn(session)).await,
            Ok(None) => self.apply_event(AuthEvent::SignedOut).await,
            Err(e) => warn!("Resync after missed auth events failed: {}", e),
        }
    }
}

/// Listener task: holds only a weak reference so a dropped controller is
/// never written to.
async fn listen(inner: Weak<ControllerInner>, mut events: broadcast::Receiver<AuthEvent>) {
    loop {
        let received = events.recv().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match received {
            Ok(event) => inner.apply_event(event).await,
            Err(RecvError::Lagged(missed)) => {
                warn!("Missed {} auth events, resyncing", missed);
                inner.resync().await;
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("Session-change listener stopped");
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::Validation(
            "Please enter a valid email address".to_string(),
        )),
    }
}

fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required".to_string()));
    }
    Ok(())
}

//! Shared application state.

use std::sync::Arc;

use crate::config::ConfigV1;
use crate::controller::AuthController;
use crate::gateway::IdentityGateway;
use crate::metrics::Metrics;
use crate::notifications::NotificationCenter;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// The identity backend behind the controller.
    pub gateway: Arc<dyn IdentityGateway>,
    /// Owner of the process-wide auth state.
    pub controller: Arc<AuthController>,
    pub notifications: Arc<NotificationCenter>,
    pub metrics: Metrics,
}

//! Application startup and server initialization.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ConfigV1;
use crate::controller::AuthController;
use crate::gateway::create_gateway;
use crate::metrics::Metrics;
use crate::notifications::NotificationCenter;
use crate::routes;
use crate::state::AppState;

/// Wires the gateway, controller and notification inbox together. Returns
/// once the initial session lookup has settled.
pub async fn build_state(config: Arc<ConfigV1>) -> AppState {
    let gateway = create_gateway(&config.gateway);
    let metrics = Metrics::new();
    let controller = AuthController::start(gateway.clone(), &config.auth, metrics.clone()).await;
    let notifications = NotificationCenter::from_config(&config.notifications).await;

    AppState {
        config,
        gateway,
        controller: Arc::new(controller),
        notifications: Arc::new(notifications),
        metrics,
    }
}

/// Initializes and runs the application server until ctrl-c.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the configured address
/// or encounters a runtime error while serving.
pub async fn run(config: Arc<ConfigV1>) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(config.clone()).await;
    let controller = state.controller.clone();
    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Starting server on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    controller.shutdown();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! ippool-webhook - assigns Calico IP pools to namespaces at admission time.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client and pool registry accessor
//! - Starts the health server and the TLS webhook server
//!
//! The webhook is stateless per replica; all claim/release coordination
//! happens through the pool registry's revision checks, so any number of
//! replicas can serve concurrently without leader election.

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use ippool_webhook::allocator::engine::Allocator;
use ippool_webhook::config::Settings;
use ippool_webhook::health::{HealthState, run_health_server};
use ippool_webhook::registry::client::KubePoolRegistry;
use ippool_webhook::webhooks::{WebhookState, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ippool_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting ippool-webhook");

    let settings = Settings::from_env();
    info!(
        placement = %format!("{}={}", settings.placement_label, settings.placement_value),
        port = settings.webhook_port,
        fail_closed_delete = settings.delete_fail_closed,
        "Loaded settings"
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let registry = KubePoolRegistry::new(client, settings.registry_timeout);
    let allocator = Allocator::new(Arc::new(registry));

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately (probes should work during startup)
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    // The webhook is ready as soon as it can serve; there is no cache to
    // warm or leadership to acquire.
    health_state.set_ready(true).await;

    let webhook_state = Arc::new(WebhookState::new(
        allocator,
        settings,
        health_state.clone(),
    ));
    let webhook_handle = tokio::spawn(async move {
        if let Err(e) = run_webhook_server(webhook_state).await {
            error!("Webhook server error: {}", e);
        }
    });

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");
            health_state.set_ready(false).await;
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut
/// down gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};

use admission_control::health::run_health_server;
use admission_control::{Config, HealthState, WebhookState, build_validator, run_webhook_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("admission_control=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("Starting admission-control");

    let config = Config::from_env();
    config.log_settings();

    if !config.cert_path.exists() || !config.key_path.exists() {
        return Err(format!(
            "TLS certificates not found at {} and {}",
            config.cert_path.display(),
            config.key_path.display()
        )
        .into());
    }

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());
    let validator = build_validator(&config, client, Some(health_state.as_ref()))?;

    // Probes should answer while the webhook starts
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let state = Arc::new(WebhookState::new(validator, Some(health_state.clone())));
        let cert_path = config.cert_path.clone();
        let key_path = config.key_path.clone();
        let port = config.webhook_port;
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(state, &cert_path, &key_path, port).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    health_state.set_ready(true).await;

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
            info!("Received shutdown signal, shutting down");
            health_state.set_ready(false).await;
        }
    }

    info!("admission-control stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

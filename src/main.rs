//! Service Plan Operator
//!
//! Main entry point for the operator. Parses configuration, sets up the
//! Kubernetes client and runs the plan controllers until a shutdown signal.

use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use serviceplan_operator::{
    config::OperatorConfig,
    controllers::{self, Context},
    metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();

    // Initialize tracing
    init_tracing(&config.log_filter);

    config.validate()?;
    info!(?config, "Starting Service Plan Operator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let metrics_port = config.metrics_port;
    let context = Arc::new(Context::new(client, config));
    let shutdown = CancellationToken::new();

    // Start metrics server
    let metrics_handle = tokio::spawn(metrics::serve(metrics_port));
    info!("Metrics server starting on port {}", metrics_port);

    let operator = controllers::run(context, shutdown.clone());
    tokio::pin!(operator);

    // Handle graceful shutdown
    tokio::select! {
        _ = &mut operator => {
            error!("Controllers exited unexpectedly");
        }
        _ = metrics_handle => {
            error!("Metrics server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
            shutdown.cancel();
            operator.await;
        }
    }

    info!("Service Plan Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
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
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

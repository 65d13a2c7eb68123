//! notify-hub server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints and stops
//! it cleanly on Ctrl-C or SIGTERM.

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use notify_hub::config::HubConfig;
use notify_hub::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = HubConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        addr = %config.listen_addr,
        queue_capacity = config.outbound_queue_capacity,
        heartbeat_timeout_secs = config.heartbeat_timeout.as_secs(),
        "starting notify-hub"
    );

    let running = server::start(config).await?;

    shutdown_signal().await;
    tracing::info!("shutdown requested");
    running.stop(Duration::from_secs(5)).await;
    tracing::info!("stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

//! civic-api: REST API server for civic issue reporting

use anyhow::Context;
use civic_api::AppState;
use civic_core::Config;
use std::sync::Arc;

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = Config::default_path();
    let config = Config::load_default()
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let state = AppState::from_config(&config).context("Failed to initialize server state")?;
    if state.tokens.is_empty() {
        tracing::warn!("No auth tokens configured, every write request will be rejected");
    }
    let app = civic_api::router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    tracing::info!("Starting civic-api on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

//! reactive-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use reactive_gateway::config::{GatewayConfig, LogFormat};
use reactive_gateway::persistence::PostgresPersistence;
use reactive_gateway::server::{build_app, build_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, ws_path = %config.ws_path, "starting reactive-gateway");

    // Optional persistence mirror
    let persistence = if config.persistence_enabled {
        let db = PostgresPersistence::connect(&config)
            .await
            .context("failed to connect to PostgreSQL")?;
        let reaped = db.reap_stale_connections().await?;
        tracing::info!(reaped, "stale sessions reaped");
        Some(db)
    } else {
        None
    };

    // Build service layer and start the publication runner
    let state = build_state(&config, persistence)?;
    let _runner = state.service.spawn_runner();
    tracing::info!(catalog = ?state.service.catalog(), "collaborators registered");

    // Build router
    let app = build_app(state, &config);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

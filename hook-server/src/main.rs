//! Hookcatch Server - captures inbound webhooks and forwards them.
//!
//! Startup order: configuration, database (with bounded retries), schema
//! migration, then the HTTP listener. Any failure before the listener is
//! bound terminates the process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hookcatch::web::shutdown_signal;
use hookcatch::{router, AppState, Config, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("server_starting");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        port = config.port,
        base_url = %config.base_url,
        forward_timeout_ms = config.forward_timeout_ms,
        db_max_connections = config.db_max_connections,
        "config_loaded"
    );

    let store = PgStore::connect(&config)
        .await
        .context("Failed to connect to database")?;
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    let port = config.port;
    let state = AppState::new(config, Arc::new(store.clone()));
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;

    info!("server_shutdown_complete");

    Ok(())
}

//! # cabana-server
//!
//! Real-time chat server. This binary provides:
//! - **Websocket endpoint** (`/ws`) with identity verification at handshake,
//!   a connection registry, and channel-scoped broadcast fan-out
//! - **Presence and typing signals** derived purely from live connection
//!   state (no durable presence storage)
//! - **Message relay**: clients persist messages over the REST API and then
//!   announce the id over the live connection; the server re-reads the
//!   authoritative row and broadcasts it
//! - **REST API** (axum) for channel and message persistence

mod api;
mod auth;
mod broadcast;
mod config;
mod error;
mod hub;
mod presence;
mod registry;
mod store;
mod typing;
mod ws;

use std::sync::Arc;

use cabana_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::hub::ChatHub;
use crate::store::SharedStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cabana_server=debug")),
        )
        .init();

    info!("Starting Cabana chat server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(addr = %config.http_addr, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the database and seed the reserved channel
    // -----------------------------------------------------------------------
    let database = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let store = SharedStore::new(database);

    let general = store.ensure_default_channel().await?;
    info!(channel = %general.id, name = %general.name, "reserved channel ready");

    // -----------------------------------------------------------------------
    // 4. Build the hub and serve (blocks until shutdown)
    // -----------------------------------------------------------------------
    let state = AppState {
        hub: ChatHub::new(store.clone()),
        store,
        config: Arc::new(config.clone()),
    };

    let listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "listening");

    tokio::select! {
        result = axum::serve(listener, api::build_router(state)) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

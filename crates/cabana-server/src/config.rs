//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use cabana_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP/websocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:3002`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database. When unset, the platform
    /// data directory is used.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Secret used to verify auth tokens.
    /// Env: `JWT_SECRET`
    /// Default: a fixed development secret (warned about at startup).
    pub jwt_secret: String,
}

const DEV_JWT_SECRET: &str = "cabana-dev-secret";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            jwt_secret: DEV_JWT_SECRET.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => config.jwt_secret = secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, using development secret");
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

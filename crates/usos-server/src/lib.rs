//! HTTP server for the USOS backend-for-frontend.
//!
//! Serves:
//! - the three-legged OAuth 1.0a login against USOS (`/auth/*`)
//! - signed proxy endpoints for logged-in users (`/api/*`)
//! - a liveness check (`/health`)
//!
//! USOS tokens never reach the browser. The browser only holds an encrypted
//! session cookie naming the user; access credentials live in the store.
//!
//! # Quick Start
//!
//! ```ignore
//! use usos_server::{ServerConfig, run_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = usos_config::Config::load(None, None).unwrap();
//!     let server_config = ServerConfig::from_config(&config).unwrap();
//!     run_server(server_config).await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP + cookie──► axum router (usos-server)
//!                                │
//!                                ├─► session gate ──► handlers
//!                                │                      │
//!                                │                      ├─► store (sqlx, SQLite)
//!                                │                      │
//!                                │                      └─► spawn_blocking ──► ErpClient (ureq)
//!                                │                                                 │
//!                                └─► /auth/* login flow ─────────────────────────► USOS
//! ```

mod app;
mod calendar;
mod error;
mod flow;
mod handlers;
mod middleware;
mod proxy;
mod session;
mod state;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use usos_config::{ConfigError, UsosConfig};
use usos_oauth::ErpClient;
use usos_oauth::quirks::WindowPolicy;
use usos_store::{SqliteStore, Store};

use crate::session::SessionCookies;
use crate::state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Exact OAuth callback URL.
    pub callback_url: String,
    /// Where the browser lands after login.
    pub frontend_url: String,
    /// Session cookie key material.
    pub session_secret: String,
    /// Session cookie name.
    pub cookie_name: String,
    /// Mark the session cookie `Secure`.
    pub cookie_secure: bool,
    /// Database URL.
    pub database_url: String,
    /// Database pool size.
    pub max_connections: u32,
    /// USOS consumer settings.
    pub usos: UsosConfig,
}

impl ServerConfig {
    /// Create server configuration from the loaded config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the `[usos]` section or the
    /// session secret is missing.
    pub fn from_config(config: &usos_config::Config) -> Result<Self, ConfigError> {
        let usos = config.require_usos()?;
        config.require_session()?;

        Ok(Self {
            host: config.server.host.clone(),
            port: config.server.port,
            callback_url: config.server.callback_url(),
            frontend_url: config.server.frontend_url.clone(),
            session_secret: config.session.secret.clone(),
            cookie_name: config.session.cookie_name.clone(),
            cookie_secure: config.session.secure,
            database_url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            usos: usos.clone(),
        })
    }
}

/// Run the server.
///
/// Connects the store (running migrations), builds the USOS client and
/// serves until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the server fails to
/// start.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn Store> =
        Arc::new(SqliteStore::connect(&config.database_url, config.max_connections).await?);

    let state = Arc::new(AppState {
        erp: Arc::new(ErpClient::from_config(&config.usos)),
        store,
        sessions: SessionCookies::new(
            &config.session_secret,
            &config.cookie_name,
            config.cookie_secure,
        ),
        callback_url: config.callback_url.clone(),
        frontend_url: config.frontend_url.clone(),
        default_scopes: config.usos.scopes.clone(),
        proxy_append_scopes: config.usos.proxy_append_scopes,
        window: WindowPolicy::new(config.usos.max_window_days),
    });

    let app = app::create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(
        address = %addr,
        usos = %config.usos.base_url,
        callback = %config.callback_url,
        "Starting server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use usos_config::{Config, UsosConfig};

    use super::*;
    use pretty_assertions::assert_eq;

    fn usos() -> UsosConfig {
        UsosConfig {
            base_url: "https://usos.test".to_owned(),
            consumer_key: "ck".to_owned(),
            consumer_secret: "cs".to_owned(),
            scopes: vec!["studies".to_owned()],
            scopes_signed: true,
            proxy_append_scopes: true,
            timeout_secs: 10,
            max_window_days: 7,
        }
    }

    #[test]
    fn test_from_config() {
        let mut config = Config {
            usos: Some(usos()),
            ..Config::default()
        };
        config.session.secret = "s".repeat(32);
        config.server.public_url = "https://bff.test/".to_owned();

        let server = ServerConfig::from_config(&config).unwrap();
        assert_eq!(server.callback_url, "https://bff.test/auth/callback");
        assert_eq!(server.usos.consumer_key, "ck");
        assert_eq!(server.session_secret.len(), 32);
    }

    #[test]
    fn test_from_config_requires_usos_section() {
        let mut config = Config::default();
        config.session.secret = "s".repeat(32);

        assert!(matches!(
            ServerConfig::from_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_from_config_requires_session_secret() {
        let config = Config {
            usos: Some(usos()),
            ..Config::default()
        };

        assert!(matches!(
            ServerConfig::from_config(&config),
            Err(ConfigError::Validation(_))
        ));
    }
}

//! `usos-bff check-config` command implementation.
//!
//! Validates the configuration the server would start with and prints it,
//! leaving out the session secret and the consumer secret.

use std::path::PathBuf;

use clap::Args;
use usos_config::Config;
use usos_server::ServerConfig;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check-config command.
#[derive(Args)]
pub(crate) struct CheckConfigArgs {
    /// Path to configuration file (default: auto-discover usos.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl CheckConfigArgs {
    /// Execute the check-config command.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or is invalid.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let config = Config::load(self.config.as_deref(), None)?;
        let server_config = ServerConfig::from_config(&config)?;

        output.highlight("Configuration");
        match &config.config_path {
            Some(path) => output.info(&format!("File: {}", path.display())),
            None => output.info("File: none (defaults)"),
        }
        for line in summary(&server_config) {
            output.info(&line);
        }
        output.success("Configuration is valid");
        Ok(())
    }
}

/// Printable settings, without secrets.
fn summary(config: &ServerConfig) -> Vec<String> {
    vec![
        format!("Listen: {}:{}", config.host, config.port),
        format!("Callback URL: {}", config.callback_url),
        format!("Frontend URL: {}", config.frontend_url),
        format!(
            "Session cookie: {} (secure: {})",
            config.cookie_name, config.cookie_secure
        ),
        format!(
            "Database: {} (max connections: {})",
            config.database_url, config.max_connections
        ),
        format!("USOS: {}", config.usos.base_url),
        format!("Consumer key: {}", config.usos.consumer_key),
        format!("Scopes: {}", config.usos.scopes.join("|")),
        format!("Sign scopes: {}", config.usos.scopes_signed),
        format!("Append scopes to proxy calls: {}", config.usos.proxy_append_scopes),
        format!("Timeout: {}s", config.usos.timeout_secs),
        format!("Max window: {} days", config.usos.max_window_days),
    ]
}

#[cfg(test)]
mod tests {
    use usos_config::UsosConfig;

    use super::*;

    #[test]
    fn test_summary_omits_secrets() {
        let config = ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            callback_url: "http://localhost:8080/auth/callback".to_owned(),
            frontend_url: "http://localhost:5173".to_owned(),
            session_secret: "session-secret-value-0123456789ab".to_owned(),
            cookie_name: "usos_session".to_owned(),
            cookie_secure: false,
            database_url: "sqlite://usos.db?mode=rwc".to_owned(),
            max_connections: 5,
            usos: UsosConfig {
                base_url: "https://usos.test".to_owned(),
                consumer_key: "ck".to_owned(),
                consumer_secret: "consumer-secret-value".to_owned(),
                scopes: vec!["studies".to_owned(), "email".to_owned()],
                scopes_signed: true,
                proxy_append_scopes: true,
                timeout_secs: 10,
                max_window_days: 7,
            },
        };

        let text = summary(&config).join("\n");
        assert!(text.contains("Scopes: studies|email"));
        assert!(text.contains("Consumer key: ck"));
        assert!(!text.contains("session-secret-value"));
        assert!(!text.contains("consumer-secret-value"));
    }
}

//! Configuration management for the USOS backend-for-frontend.
//!
//! Parses `usos.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `server.host`, `server.public_url`, `server.frontend_url`
//! - `session.secret`
//! - `database.url`
//! - `usos.base_url`, `usos.consumer_key`, `usos.consumer_secret`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "usos.toml";

/// Minimum session secret length in bytes.
const MIN_SESSION_SECRET_LEN: usize = 32;

/// Path of the OAuth callback route, appended to `server.public_url`.
const CALLBACK_PATH: &str = "/auth/callback";

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Session cookie configuration.
    pub session: SessionConfig,
    /// Relational store configuration.
    pub database: DatabaseConfig,
    /// USOS connection and OAuth consumer configuration.
    pub usos: Option<UsosConfig>,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Externally visible base URL of this server (used for the OAuth callback).
    pub public_url: String,
    /// Frontend landing page; login results redirect here.
    pub frontend_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            public_url: "http://localhost:8080".to_owned(),
            frontend_url: "http://localhost:5173".to_owned(),
        }
    }
}

impl ServerConfig {
    /// The exact callback URL registered with USOS.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!("{}{CALLBACK_PATH}", self.public_url.trim_end_matches('/'))
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Secret used to derive the cookie encryption key.
    pub secret: String,
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Mark the cookie `Secure` (HTTPS only).
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: "usos_session".to_owned(),
            secure: false,
        }
    }
}

impl SessionConfig {
    /// Validate that the session can be used to encrypt cookies.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the secret is too short.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Validation(format!(
                "session.secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
            )));
        }
        require_non_empty(&self.cookie_name, "session.cookie_name")?;
        Ok(())
    }
}

/// Relational store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL.
    pub url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://usos.db?mode=rwc".to_owned(),
            max_connections: 5,
        }
    }
}

/// USOS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UsosConfig {
    /// USOS API base URL (without the `/services` suffix).
    pub base_url: String,
    /// OAuth consumer key.
    pub consumer_key: String,
    /// OAuth consumer secret.
    pub consumer_secret: String,
    /// Scopes requested at login when the client does not ask for specific ones.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Include `scopes` in the OAuth signature base string.
    #[serde(default = "default_true")]
    pub scopes_signed: bool,
    /// Append the user's granted scopes to every proxied request.
    #[serde(default = "default_true")]
    pub proxy_append_scopes: bool,
    /// Timeout for every outbound USOS call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ceiling for `days` on schedule-like endpoints.
    #[serde(default = "default_max_window_days")]
    pub max_window_days: u32,
}

impl UsosConfig {
    /// Validate that all required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any field is empty or has invalid format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MAX_TIMEOUT_SECS: u64 = 120;

        require_non_empty(&self.base_url, "usos.base_url")?;
        require_http_url(&self.base_url, "usos.base_url")?;
        require_non_empty(&self.consumer_key, "usos.consumer_key")?;
        require_non_empty(&self.consumer_secret, "usos.consumer_secret")?;

        if self.scopes.is_empty() {
            return Err(ConfigError::Validation(
                "usos.scopes cannot be empty".to_owned(),
            ));
        }
        if let Some(bad) = self.scopes.iter().find(|s| !is_valid_scope(s)) {
            return Err(ConfigError::Validation(format!(
                "usos.scopes contains invalid scope '{bad}'"
            )));
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "usos.timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}"
            )));
        }
        if self.max_window_days == 0 {
            return Err(ConfigError::Validation(
                "usos.max_window_days must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Whether a scope name matches the USOS scope syntax (`[a-z_]+`).
#[must_use]
pub fn is_valid_scope(scope: &str) -> bool {
    !scope.is_empty() && scope.bytes().all(|b| b.is_ascii_lowercase() || b == b'_')
}

fn default_scopes() -> Vec<String> {
    ["studies", "email", "grades", "crstests", "cards", "mailclient"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_window_days() -> u32 {
    7
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`usos.consumer_secret`").
        field: String,
        /// Error message (e.g., "${`USOS_CONSUMER_SECRET`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `usos.toml` in current directory and parents.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
    }

    /// Get validated USOS configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the section is missing or invalid.
    pub fn require_usos(&self) -> Result<&UsosConfig, ConfigError> {
        let usos = self
            .usos
            .as_ref()
            .ok_or_else(|| ConfigError::Validation("[usos] section required in config".into()))?;
        usos.validate()?;
        Ok(usos)
    }

    /// Get validated session configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if the secret is missing or too short.
    pub fn require_session(&self) -> Result<&SessionConfig, ConfigError> {
        self.session.validate()?;
        Ok(&self.session)
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks server and database settings. The `[usos]` and `[session]`
    /// sections are validated on demand by [`Config::require_usos`] and
    /// [`Config::require_session`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_database()?;
        Ok(())
    }

    /// Validate server configuration.
    fn validate_server(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;

        // Port 0 is technically valid (OS assigns a random port), but it's
        // unlikely to be intentional in a config file
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }

        require_http_url(&self.server.public_url, "server.public_url")?;
        require_http_url(&self.server.frontend_url, "server.frontend_url")?;
        Ok(())
    }

    /// Validate database configuration.
    fn validate_database(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.database.url, "database.url")?;
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        self.server.public_url = expand::expand_env(&self.server.public_url, "server.public_url")?;
        self.server.frontend_url =
            expand::expand_env(&self.server.frontend_url, "server.frontend_url")?;

        self.session.secret = expand::expand_env(&self.session.secret, "session.secret")?;
        self.database.url = expand::expand_env(&self.database.url, "database.url")?;

        if let Some(ref mut usos) = self.usos {
            usos.base_url = expand::expand_env(&usos.base_url, "usos.base_url")?;
            usos.consumer_key = expand::expand_env(&usos.consumer_key, "usos.consumer_key")?;
            usos.consumer_secret =
                expand::expand_env(&usos.consumer_secret, "usos.consumer_secret")?;
        }

        Ok(())
    }
}

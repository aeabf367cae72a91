//! # Application configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GatewayError, Result};

/// Environment variable naming an alternate TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "CREDENTIAL_GATEWAY_CONFIG";

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Request-security configuration
    #[serde(default)]
    pub security: SecurityConfig,
    /// OAuth broker configuration
    #[serde(default)]
    pub oauth: OAuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub bind_address: String,
    /// Listen port
    pub port: u16,
    /// Whether CORS is enabled
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8085,
            enable_cors: true,
        }
    }
}

/// Request-security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// When enabled, every request is expected to carry an identity and a
    /// missing or malformed authorization header fails the request.
    pub internal_auth_enabled: bool,
    /// Whether per-request audit queues are published to the audit sink
    pub audit_logging_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            internal_auth_enabled: false,
            audit_logging_enabled: true,
        }
    }
}

/// OAuth broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Timeout for token-endpoint exchanges, in seconds
    pub token_exchange_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_exchange_timeout_secs: 30,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            oauth: OAuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the file named by `CREDENTIAL_GATEWAY_CONFIG`,
    /// falling back to defaults when the variable is unset or the file does
    /// not exist.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from_file(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw).map_err(|e| GatewayError::Config {
            message: format!("failed to parse config file {}", path.display()),
            source: Some(e.into()),
        })?;
        config
            .validate()
            .map_err(|message| GatewayError::Config {
                message,
                source: None,
            })?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.server
            .bind_address
            .parse::<std::net::IpAddr>()
            .map_err(|e| format!("invalid bind address '{}': {e}", self.server.bind_address))?;
        if self.oauth.token_exchange_timeout_secs == 0 {
            return Err("oauth.token_exchange_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

//! Configuration module
//!
//! Reads a TOML file (default: ~/.config/tably-ordering/config.toml) and
//! falls back to defaults when absent.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Full application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "super-secret-key-change-in-production".to_string(),
            jwt_expiration_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Handshake token verification timeout in seconds
    pub auth_timeout_secs: u64,
    /// Event bus channel capacity
    pub channel_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth_timeout_secs: 5,
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tably-ordering")
        .join("config.toml")
}

/// Runtime server configuration handed to the gateway
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub auth_timeout_secs: u64,
}

impl Config {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<&AppConfig> for Config {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            host: cfg.server.host.clone(),
            port: cfg.server.port,
            auth_timeout_secs: cfg.gateway.auth_timeout_secs,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.gateway.auth_timeout_secs, 5);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9200

            [gateway]
            auth_timeout_secs = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9200);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.gateway.auth_timeout_secs, 2);

        let runtime = Config::from(&cfg);
        assert_eq!(runtime.address(), "0.0.0.0:9200");
    }
}

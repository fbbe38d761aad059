//! Configuration loading

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use todo_auth::{DEFAULT_TOKEN_LIFETIME_SECS, KeyMode};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Where user records live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    /// Process-local store, lost on restart
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            path: default_db_path(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret; blank or absent falls back unless `strict_secret`
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_expiration_seconds")]
    pub expiration_seconds: i64,
    /// Refuse to start without a configured secret
    #[serde(default)]
    pub strict_secret: bool,
    /// Leave requests unauthenticated when the token subject has no user
    #[serde(default)]
    pub enforce_subject_exists: bool,
    #[serde(default = "default_resolver_timeout_ms")]
    pub resolver_timeout_ms: u64,
    /// Extra public path patterns, checked before the protected API prefix
    #[serde(default)]
    pub public_paths: Vec<String>,
}

impl AuthConfig {
    pub fn key_mode(&self) -> KeyMode {
        if self.strict_secret {
            KeyMode::Strict
        } else {
            KeyMode::Lenient
        }
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            expiration_seconds: default_expiration_seconds(),
            strict_secret: false,
            enforce_subject_exists: false,
            resolver_timeout_ms: default_resolver_timeout_ms(),
            public_paths: Vec::new(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "./data/todo.db".to_string()
}

fn default_expiration_seconds() -> i64 {
    DEFAULT_TOKEN_LIFETIME_SECS
}

fn default_resolver_timeout_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a loaded configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

impl Config {
    /// Load configuration from a TOML file, or defaults when it does not exist
    ///
    /// Runs before logging is up, so the source is returned for the caller
    /// to report.
    pub fn load(path: &str) -> Result<(Self, ConfigSource)> {
        if !Path::new(path).exists() {
            return Ok((Self::default(), ConfigSource::Defaults));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok((config, ConfigSource::File))
    }
}

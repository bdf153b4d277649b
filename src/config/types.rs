//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::listen::ListenConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Hub configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token verification.
    pub auth: AuthConfig,
    /// Queue sizes and routing policy.
    #[serde(default)]
    pub hub: HubConfig,
    /// Per-connection keepalive.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name reported in logs.
    pub name: String,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "chathub.db".to_string()
}

/// Token verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key shared with whatever issues tokens.
    pub token_secret: String,
}

/// Hub configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Per-connection outbound queue capacity (default: 100).
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
    /// Inbound envelope queue capacity in front of the router (default: 1024).
    #[serde(default = "default_router_queue")]
    pub router_queue: usize,
    /// Push a system notice to each connection once it is active.
    #[serde(default = "default_true")]
    pub welcome: bool,
    /// Use `sendId` from the frame when present instead of the connection's
    /// authenticated identity.
    #[serde(default = "default_true")]
    pub trust_wire_sender: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
            router_queue: default_router_queue(),
            welcome: true,
            trust_wire_sender: true,
        }
    }
}

fn default_outbound_queue() -> usize {
    100
}

fn default_router_queue() -> usize {
    1024
}

pub(super) fn default_true() -> bool {
    true
}

/// Keepalive configuration for client connections.
///
/// The writer pings every `ping_interval` seconds; the reader gives up after
/// `idle_timeout` seconds without any inbound frame (pongs included).
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

impl ConnectionConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            ping_interval: default_ping_interval(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    90
}

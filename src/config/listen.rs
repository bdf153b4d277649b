//! Network listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// WebSocket listener configuration.
///
/// TLS is expected to terminate at a reverse proxy in front of the hub.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
    /// Allowed `Origin` header values. Empty allows any origin.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

impl ListenConfig {
    /// Whether a handshake carrying `origin` may proceed.
    ///
    /// Requests without an `Origin` header come from non-browser clients and
    /// are always allowed.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allow_origins.is_empty() {
            return true;
        }
        match origin {
            Some(origin) => self.allow_origins.iter().any(|o| o == origin),
            None => true,
        }
    }
}

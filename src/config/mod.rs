//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, HubConfig, ConnectionConfig)
//! - [`listen`]: WebSocket listener configuration (ListenConfig)
//! - [`validation`]: Startup checks collecting every problem at once

mod listen;
mod types;
mod validation;

pub use listen::ListenConfig;
pub use types::{
    AuthConfig, Config, ConfigError, ConnectionConfig, DatabaseConfig, HubConfig, ServerConfig,
};
pub use validation::{MIN_TOKEN_SECRET_LEN, ValidationError, validate};

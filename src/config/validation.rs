//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Shortest accepted `auth.token_secret`, in bytes.
pub const MIN_TOKEN_SECRET_LEN: usize = 16;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("hub.{0} must be greater than zero")]
    ZeroQueue(&'static str),
    #[error("auth.token_secret must be at least {MIN_TOKEN_SECRET_LEN} bytes, got {0}")]
    TokenSecretTooShort(usize),
    #[error("connection.ping_interval must be greater than zero")]
    ZeroPingInterval,
    #[error("connection.idle_timeout ({idle}s) must exceed ping_interval ({ping}s)")]
    IdleTimeoutTooShort { idle: u64, ping: u64 },
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    if config.hub.outbound_queue == 0 {
        errors.push(ValidationError::ZeroQueue("outbound_queue"));
    }
    if config.hub.router_queue == 0 {
        errors.push(ValidationError::ZeroQueue("router_queue"));
    }

    let secret_len = config.auth.token_secret.len();
    if secret_len < MIN_TOKEN_SECRET_LEN {
        errors.push(ValidationError::TokenSecretTooShort(secret_len));
    }

    let conn = &config.connection;
    if conn.ping_interval == 0 {
        errors.push(ValidationError::ZeroPingInterval);
    } else if conn.idle_timeout <= conn.ping_interval {
        errors.push(ValidationError::IdleTimeoutTooShort {
            idle: conn.idle_timeout,
            ping: conn.ping_interval,
        });
    }

    if config.database.path != ":memory:" {
        let db_path = Path::new(&config.database.path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::DatabasePathInvalid(
                config.database.path.clone(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

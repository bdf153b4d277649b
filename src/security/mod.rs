//! Connection authentication.
//!
//! The gateway only needs "which user does this credential belong to". That
//! question is answered by an [`Authenticator`]; [`TokenAuthority`] is the
//! HMAC-SHA256 implementation the daemon ships with.

pub mod token;

pub use token::TokenAuthority;

use thiserror::Error;

/// Why a credential was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no token supplied")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token names no user")]
    EmptyUser,
    #[error("signing key rejected")]
    InvalidKey,
}

impl AuthError {
    /// Get a static error code string for metrics labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Malformed => "malformed",
            Self::Expired => "expired",
            Self::BadSignature => "bad_signature",
            Self::EmptyUser => "empty_user",
            Self::InvalidKey => "invalid_key",
        }
    }
}

/// Resolves a credential to a user id.
///
/// Called from inside the WebSocket handshake, so implementations must not
/// block.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<String, AuthError>;
}

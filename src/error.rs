//! Error types for routing.
//!
//! Frame decoding errors live in `chathub_proto`, persistence errors in
//! [`crate::store`]. Everything here is per-envelope: a failure aborts one
//! message and the router carries on.

use crate::store::StoreError;
use chathub_proto::ProtocolError;
use thiserror::Error;

// ============================================================================
// Route Errors (envelope processing)
// ============================================================================

/// Errors that can occur while routing one envelope.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("envelope has no sender")]
    EmptySender,

    #[error("envelope has no receiver")]
    EmptyReceiver,

    #[error("no such group: {0}")]
    GroupNotFound(String),

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error("failed to encode push: {0}")]
    Encode(#[from] ProtocolError),
}

impl RouteError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptySender => "empty_sender",
            Self::EmptyReceiver => "empty_receiver",
            Self::GroupNotFound(_) => "group_not_found",
            Self::Store(_) => "store_error",
            Self::Encode(_) => "encode_error",
        }
    }

    /// Whether the error came from the client rather than the backend.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::EmptySender | Self::EmptyReceiver)
    }
}

/// Convenience type alias for routing results.
pub type RouteResult<T = ()> = Result<T, RouteError>;

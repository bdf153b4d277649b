//! Error types for frame decoding and push encoding.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors produced while decoding client frames or encoding pushes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON or has a field of the wrong shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The `action` tag names something this protocol does not know.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A field required by the action is absent or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A chat frame carries a `type` clients may not send.
    #[error("unsupported message type: {0}")]
    UnsupportedType(i16),
}

impl ProtocolError {
    /// Static code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownAction(_) => "unknown_action",
            Self::MissingField(_) => "missing_field",
            Self::UnsupportedType(_) => "unsupported_type",
        }
    }
}

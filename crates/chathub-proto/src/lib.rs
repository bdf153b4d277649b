//! # chathub-proto
//!
//! Wire types for the chathub real-time messaging protocol.
//!
//! Clients speak JSON over WebSocket text frames. Every inbound frame is
//! decoded exactly once into a closed [`ClientAction`]; every push the hub
//! sends back is one of the [`outbound`] types.
//!
//! ## Features
//!
//! - Tolerant decoding of the client frame (absent fields default, `null`
//!   is treated as absent, `fileSize` accepts numbers or strings)
//! - Exhaustive action dispatch: chat send, group join/leave, call signaling
//! - Outbound chat pushes, call signals and system notices
//!
//! ## Quick Start
//!
//! ```rust
//! use chathub_proto::{ClientAction, message_type};
//!
//! let raw = r#"{"type":0,"content":"hi","receiveId":"G1","sendId":"U2"}"#;
//! match ClientAction::decode(raw).unwrap() {
//!     ClientAction::SendMessage(send) => {
//!         assert_eq!(send.kind, message_type::TEXT);
//!         assert_eq!(send.receive_id, "G1");
//!     }
//!     other => panic!("unexpected action: {other:?}"),
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod inbound;
pub mod outbound;

pub use error::{ProtocolError, Result};
pub use inbound::{CallAction, CallRequest, ChatSend, ClientAction, WireFrame};
pub use outbound::{CallSignal, OutgoingMessage, ServerPush, SystemNotice, encode};

/// Numeric message types carried in the `type` field.
pub mod message_type {
    /// Plain text.
    pub const TEXT: i16 = 0;
    /// File or image reference (`url` plus file metadata).
    pub const FILE: i16 = 1;
    /// Call record.
    pub const CALL: i16 = 2;
    /// Hub-generated system notice (never persisted).
    pub const SYSTEM: i16 = 99;
}

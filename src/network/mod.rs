//! Network module.
//!
//! Contains the Gateway (TCP listener and authenticated upgrade) and the
//! per-client Connection actor.

mod connection;
mod gateway;

pub use connection::{ClientConnection, ConnectionState};
pub use gateway::{Gateway, HandshakeError, handshake};

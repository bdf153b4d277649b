//! chathub - real-time chat connection hub and message router.
//!
//! Accepts authenticated WebSocket connections, tracks who is online, routes
//! chat messages to direct peers or live group subscribers after persisting
//! them, and relays call signaling between peers.
//!
//! The moving parts, leaves first:
//! - [`state::ConnectionRegistry`]: user id → live connection
//! - [`state::GroupSubscriptions`]: group id → users subscribed live
//! - [`network::ClientConnection`]: reader and writer tasks per socket
//! - [`routing::MessageRouter`]: single consumer of the envelope queue
//! - [`state::Hub`]: ties the above together and owns shutdown

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod ids;
pub mod metrics;
pub mod network;
pub mod routing;
pub mod security;
pub mod state;
pub mod store;
pub mod telemetry;

pub use chathub_proto as proto;

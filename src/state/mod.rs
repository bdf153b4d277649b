//! State management module.
//!
//! Contains the [`Hub`] (shared state) and the structures it is built from.

mod hub;
mod registry;
mod subscriptions;

pub use hub::{GROUP_DISMISS, Hub, HubSettings};
pub use registry::{ConnectionHandle, ConnectionRegistry, DeliveryOutcome, Payload};
pub use subscriptions::GroupSubscriptions;

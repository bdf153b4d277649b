//! Message routing: the router task, its envelope type, and the call relay.

mod call;
mod envelope;
mod router;

pub use call::CallSignalRelay;
pub use envelope::Envelope;
pub use router::{MessageRouter, RouteKind, Routed, route};

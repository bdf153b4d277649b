//! Telemetry utilities for route timing and span construction.

use std::time::Instant;

/// Guard for timing one envelope through the router.
///
/// Records latency under the route kind when dropped, if a kind was set.
/// Aborted envelopes never get a kind and are counted as errors instead.
pub struct RouteTimer {
    kind: Option<&'static str>,
    start: Instant,
}

impl RouteTimer {
    /// Start timing.
    pub fn start() -> Self {
        Self {
            kind: None,
            start: Instant::now(),
        }
    }

    /// Mark the envelope as routed along `kind` (`direct` or `group`).
    pub fn routed(&mut self, kind: &'static str) {
        self.kind = Some(kind);
    }
}

impl Drop for RouteTimer {
    fn drop(&mut self) {
        if let Some(kind) = self.kind {
            crate::metrics::record_routed(kind, self.start.elapsed().as_secs_f64());
        }
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for a client connection.
    pub fn connection(user: &str, conn_id: u64) -> Span {
        info_span!("connection", user = %user, conn = conn_id)
    }

    /// Create a span for routing one envelope.
    pub fn route(sender: &str, receiver: &str) -> Span {
        info_span!("route", sender = %sender, receiver = %receiver)
    }
}

//! Prometheus metrics collection for chathub.
//!
//! Metrics are exposed on the HTTP endpoint in [`crate::http`]. Every
//! recording helper is a no-op until [`init`] has run, so library users and
//! tests that never call it pay nothing.
//!
//! - `chathub_connected_users` - Live connections (gauge)
//! - `chathub_messages_routed_total{kind}` - Envelopes persisted and fanned out
//! - `chathub_messages_dropped_total{reason}` - Pushes or envelopes shed under load
//! - `chathub_route_errors_total{code}` - Envelopes aborted, by error code
//! - `chathub_call_signals_total{action}` - Call signals relayed
//! - `chathub_message_fanout` - Recipients per routed message (histogram)
//! - `chathub_route_duration_seconds` - Router latency per envelope (histogram)

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Gauges
// ========================================================================

/// Currently connected users.
pub static CONNECTED_USERS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Counters
// ========================================================================

/// Envelopes routed, by `direct` / `group`.
pub static MESSAGES_ROUTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Pushes or envelopes dropped, by reason.
pub static MESSAGES_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Envelopes aborted, by `RouteError::error_code`.
pub static ROUTE_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Call signals relayed, by action tag.
pub static CALL_SIGNALS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Message fan-out histogram: how many recipients per routed message.
pub static MESSAGE_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Time from dequeue to last push for one envelope.
pub static ROUTE_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are recorded. Later calls
/// are harmless.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                let m = $init.expect(concat!(stringify!($metric), " creation failed"));
                if let Err(e) = r.register(Box::new(m.clone())) {
                    tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                }
                let _ = $metric.set(m);
            }
        };
    }

    register!(CONNECTED_USERS, IntGauge::new("chathub_connected_users", "Currently connected users"));
    register!(MESSAGES_ROUTED, IntCounterVec::new(Opts::new("chathub_messages_routed_total", "Messages routed by kind"), &["kind"]));
    register!(MESSAGES_DROPPED, IntCounterVec::new(Opts::new("chathub_messages_dropped_total", "Messages dropped by reason"), &["reason"]));
    register!(ROUTE_ERRORS, IntCounterVec::new(Opts::new("chathub_route_errors_total", "Routing failures by error code"), &["code"]));
    register!(CALL_SIGNALS, IntCounterVec::new(Opts::new("chathub_call_signals_total", "Call signals relayed by action"), &["action"]));
    register!(MESSAGE_FANOUT, Histogram::with_opts(
        HistogramOpts::new("chathub_message_fanout", "Recipients per routed message")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0])));
    register!(ROUTE_LATENCY, Histogram::with_opts(
        HistogramOpts::new("chathub_route_duration_seconds", "Router processing time per message")
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

fn inc_label(metric: &OnceLock<IntCounterVec>, label: &str) {
    if let Some(c) = metric.get() {
        c.with_label_values(&[label]).inc();
    }
}

/// Set the connected-users gauge.
#[inline]
pub fn set_connected_users(count: usize) {
    if let Some(g) = CONNECTED_USERS.get() {
        g.set(count as i64);
    }
}

/// Record one routed message and its latency.
#[inline]
pub fn record_routed(kind: &str, duration_secs: f64) {
    inc_label(&MESSAGES_ROUTED, kind);
    if let Some(h) = ROUTE_LATENCY.get() {
        h.observe(duration_secs);
    }
}

/// Record a dropped push or envelope.
#[inline]
pub fn record_dropped(reason: &str) {
    inc_label(&MESSAGES_DROPPED, reason);
}

/// Record an aborted envelope.
#[inline]
pub fn record_route_error(code: &str) {
    inc_label(&ROUTE_ERRORS, code);
}

/// Record a relayed call signal.
#[inline]
pub fn record_call_signal(action: &str) {
    inc_label(&CALL_SIGNALS, action);
}

/// Record message fan-out (how many recipients a message was queued for).
#[inline]
pub fn record_fanout(recipients: usize) {
    if let Some(h) = MESSAGE_FANOUT.get() {
        h.observe(recipients as f64);
    }
}

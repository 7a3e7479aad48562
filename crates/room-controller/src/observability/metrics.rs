//! Metrics definitions for the room controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `room_` prefix
//! - `_total` suffix for counters
//!
//! Without an installed recorder every call here is a no-op, so the core can
//! be exercised in tests without a Prometheus exporter.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with its own HTTP listener.
///
/// Must be called from within a tokio runtime, before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder or listener fails to install.
pub fn init_metrics_recorder(listen_address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(listen_address)
        .install()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Set the number of live participants.
///
/// Metric: `room_participants_active`
pub fn set_participants_active(count: usize) {
    // usize to f64 conversion is safe for realistic room sizes
    #[allow(clippy::cast_precision_loss)]
    gauge!("room_participants_active").set(count as f64);
}

/// Record an event handled by the room actor.
///
/// Metric: `room_events_total`
/// Labels: `event_type`
pub fn record_event(event_type: &'static str) {
    counter!("room_events_total", "event_type" => event_type).increment(1);
}

/// Record a slot transition.
///
/// Metric: `room_slot_transitions_total`
/// Labels: `transition` (join_featured, demote, promote, leave_featured,
/// leave_grid, auto_promote)
pub fn record_slot_transition(transition: &'static str) {
    counter!("room_slot_transitions_total", "transition" => transition).increment(1);
}

/// Record an error handled (and usually ignored) by the room actor.
///
/// Metric: `room_errors_total`
/// Labels: `error_type`
pub fn record_error(error_type: &'static str) {
    counter!("room_errors_total", "error_type" => error_type).increment(1);
}

/// Set the room actor mailbox depth.
///
/// Metric: `room_actor_mailbox_depth`
pub fn set_actor_mailbox_depth(depth: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("room_actor_mailbox_depth").set(depth as f64);
}

/// Record one telemetry sample.
///
/// Metric: `room_telemetry_samples_total`
pub fn record_telemetry_sample() {
    counter!("room_telemetry_samples_total").increment(1);
}

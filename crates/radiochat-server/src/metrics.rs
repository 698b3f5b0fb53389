//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before any metric is recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric names, shared by the session and dispatch code.

/// WebSocket sessions registered (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket sessions torn down (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Registered sessions (gauge, labels: role).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Handshakes refused (counter, labels: reason).
pub const WS_HANDSHAKE_REJECTIONS_TOTAL: &str = "ws_handshake_rejections_total";
/// User sessions replaced by a newer one (counter).
pub const WS_SESSIONS_SUPERSEDED_TOTAL: &str = "ws_sessions_superseded_total";
/// Frames written to recipients (counter, labels: direction).
pub const RELAY_MESSAGES_FORWARDED_TOTAL: &str = "relay_messages_forwarded_total";
/// Recipients dropped after a failed write (counter).
pub const RELAY_DELIVERY_FAILURES_TOTAL: &str = "relay_delivery_failures_total";

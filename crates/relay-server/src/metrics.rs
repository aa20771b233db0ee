//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Fails if another recorder
/// is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants shared by the handlers and the client registry.

/// WebSocket connections opened total (counter).
pub const CONNECTIONS_TOTAL: &str = "relay_connections_total";
/// WebSocket disconnections total (counter).
pub const DISCONNECTIONS_TOTAL: &str = "relay_disconnections_total";
/// Open WebSocket connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "relay_connections_active";
/// Notification requests accepted (counter, labels: kind).
pub const NOTIFICATIONS_TOTAL: &str = "relay_notifications_total";
/// Frames queued to a client (counter).
pub const DELIVERIES_TOTAL: &str = "relay_deliveries_total";
/// Frames dropped on a full or closed queue (counter).
pub const DELIVERY_DROPS_TOTAL: &str = "relay_delivery_drops_total";

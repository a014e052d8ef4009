//! Prometheus-style counters and gauges for the collaboration server.
//!
//! Mirrors the teacher's `Metrics` struct: thin wrappers over the `metrics`
//! crate's macros, plus a `PrometheusHandle` installed once at startup so
//! `/metrics` can render real exposition text instead of a hand-built string.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::warn;

#[derive(Clone)]
pub struct Metrics {
    handle: Option<PrometheusHandle>,
}

impl Metrics {
    /// Installs the global Prometheus recorder. Safe to call once per
    /// process; a second install is logged and degrades to a no-op handle
    /// rather than panicking (tests construct multiple `Metrics` instances).
    pub fn install() -> Self {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => Self { handle: Some(handle) },
            Err(e) => {
                warn!(error = %e, "prometheus recorder already installed");
                Self { handle: None }
            }
        }
    }

    pub fn render(&self) -> String {
        self.handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }

    pub fn set_room_count(&self, count: usize) {
        metrics::gauge!("canvas_rooms_total").set(count as f64);
    }

    pub fn set_session_count(&self, count: usize) {
        metrics::gauge!("canvas_sessions_total").set(count as f64);
    }

    pub fn record_operation_appended(&self) {
        metrics::counter!("canvas_operations_appended_total").increment(1);
    }

    pub fn record_broadcast_sent(&self) {
        metrics::counter!("canvas_broadcasts_sent_total").increment(1);
    }

    pub fn record_broadcast_dropped(&self) {
        metrics::counter!("canvas_broadcasts_dropped_total").increment(1);
    }

    pub fn record_room_reaped(&self) {
        metrics::counter!("canvas_rooms_reaped_total").increment(1);
    }
}

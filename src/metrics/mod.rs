//! Prometheus metrics wiring.
//!
//! ## Metrics Tracked
//!
//! **Counters:**
//! - `paygate_dispatch_failures_total{upstream}` - failed dispatch attempts
//! - `paygate_requeue_failures_total` - requeues rejected by a full queue
//! - `paygate_intake_rejections_total` - intake rejected by a full queue
//! - `paygate_proxy_errors_total{kind}` - proxied requests that failed
//!
//! **Histograms:**
//! - `paygate_dispatch_duration_seconds{upstream}` - payment round trips
//!
//! **Gauges:**
//! - `paygate_queue_depth` - payments waiting for a worker
//! - `paygate_circuit_status` - published routing status (0/1/2)

pub use metrics_exporter_prometheus::PrometheusBuilder;

use crate::api::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Install the global Prometheus recorder and return its handle.
///
/// Safe to call more than once: if a recorder is already installed (tests,
/// repeated AppState construction), a detached handle is returned instead.
pub fn setup_metrics() -> PrometheusHandle {
    PrometheusBuilder::new().install_recorder().unwrap_or_else(|e| {
        tracing::debug!("metrics recorder already installed, using detached handle: {e}");
        PrometheusBuilder::new().build_recorder().handle()
    })
}

/// Handler for GET /metrics (Prometheus text format).
///
/// Always returns 200 with the exposition content type, even before any
/// metric has been recorded.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let rendered = state.prometheus_handle.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        rendered,
    )
}

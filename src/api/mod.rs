//! Gateway HTTP surface.
//!
//! ## Endpoints
//!
//! - `POST /payments` - accept a payment into the dispatch queue
//! - `GET /payments-summary` - completed-payment totals over a time range,
//!   merged with the peer node's unless `internal=true`
//! - `POST /circuit/{status}` - peer status push receiver
//! - `GET /metrics` - Prometheus exposition

mod circuit;
mod error;
mod payments;

pub use error::ApiError;
pub use payments::{PaymentIntake, SummaryParams};

use crate::circuit::StatusCell;
use crate::config::GatewayConfig;
use crate::dispatch::PaymentQueue;
use crate::store::PaymentStore;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub queue: Arc<PaymentQueue>,
    pub status: Arc<StatusCell>,
    pub store: Arc<PaymentStore>,
    pub config: Arc<GatewayConfig>,
    pub http_client: reqwest::Client,
    pub prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl AppState {
    /// Create new application state with the given shared components.
    pub fn new(
        queue: Arc<PaymentQueue>,
        status: Arc<StatusCell>,
        store: Arc<PaymentStore>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("Failed to build HTTP client");

        let prometheus_handle = crate::metrics::setup_metrics();

        Self {
            queue,
            status,
            store,
            config,
            http_client,
            prometheus_handle,
        }
    }
}

/// Create the gateway router with all endpoints configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body = state.config.server.max_body_bytes;
    Router::new()
        .route("/payments", post(payments::intake))
        .route("/payments-summary", get(payments::summary))
        .route("/circuit/:status", post(circuit::receive_status))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .layer(RequestBodyLimitLayer::new(max_body))
        .with_state(state)
}

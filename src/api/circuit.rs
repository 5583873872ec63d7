//! Peer status push receiver.

use super::AppState;
use crate::circuit::CircuitStatus;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use std::sync::Arc;

/// POST /circuit/{status} - overwrite the local routing status.
///
/// The push is accepted unconditionally: only the decision authority ever
/// originates one, and this node is by construction not it. Unparseable
/// values fall back to 0 (primary).
pub async fn receive_status(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> StatusCode {
    let value: u8 = raw.parse().unwrap_or(0);
    let status = CircuitStatus::from_u8(value);

    tracing::debug!(status = %status, "circuit status pushed by peer");
    state.status.store(status);
    metrics::gauge!("paygate_circuit_status").set(status.as_u8() as f64);

    StatusCode::OK
}

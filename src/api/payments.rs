//! Payment intake and summary handlers.

use super::{ApiError, AppState};
use crate::payment::PaymentRequest;
use crate::store::PaymentSummary;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Client submission body. Everything else on [`PaymentRequest`] is stamped
/// by the gateway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntake {
    pub correlation_id: Uuid,
    pub amount: f64,
}

/// POST /payments - accept a payment into the dispatch queue.
///
/// The client sees success as soon as the payment is queued; delivery
/// happens asynchronously and transient upstream failures are never
/// surfaced here.
pub async fn intake(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PaymentIntake>,
) -> Result<StatusCode, ApiError> {
    let payment = PaymentRequest::new(body.correlation_id, body.amount);

    state.queue.push(payment).map_err(|_| {
        metrics::counter!("paygate_intake_rejections_total").increment(1);
        ApiError::QueueFull
    })?;

    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub internal: Option<String>,
}

/// GET /payments-summary - totals over `[from, to]`.
///
/// Unless `internal=true`, the peer node's own totals are fetched (with
/// `internal=true` to stop the recursion) and merged in. Peer failures
/// degrade to local-only figures.
pub async fn summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<PaymentSummary>, ApiError> {
    let from = parse_rfc3339(&params.from)?;
    let to = parse_rfc3339(&params.to)?;

    let mut summary = state.store.summarize(from, to);

    let internal = params.internal.as_deref() == Some("true");
    if !internal {
        if let Some(peer_url) = &state.config.upstream.peer_url {
            match fetch_peer_summary(&state.http_client, peer_url, &params.from, &params.to).await
            {
                Some(peer) => summary.merge(&peer),
                None => tracing::warn!("peer summary unavailable, returning local totals only"),
            }
        }
    }

    Ok(Json(summary))
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError::InvalidTimeRange(format!("{value}: {e}")))
}

/// Fetch the paired node's local summary. Any failure returns `None`.
async fn fetch_peer_summary(
    client: &reqwest::Client,
    peer_url: &str,
    from: &str,
    to: &str,
) -> Option<PaymentSummary> {
    let url = format!("{}/payments-summary", peer_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .query(&[("from", from), ("to", to), ("internal", "true")])
        .send()
        .await
        .map_err(|e| tracing::warn!(url = %url, error = %e, "peer summary request failed"))
        .ok()?;

    if !response.status().is_success() {
        tracing::warn!(url = %url, http_status = %response.status(), "peer summary rejected");
        return None;
    }

    response
        .json::<PaymentSummary>()
        .await
        .map_err(|e| tracing::warn!(url = %url, error = %e, "peer summary undecodable"))
        .ok()
}

//! Power-of-two-choices reverse proxy.
//!
//! Distributes inbound client traffic across a fixed list of gateway
//! replicas using live in-flight counts instead of pure round robin. Every
//! method, path, and query is forwarded verbatim (beyond base-path joining);
//! request and response bodies stream end-to-end without buffering.

mod backend;
mod error;
pub mod headers;

pub use backend::{Backend, BackendPool, InFlightGuard};
pub use error::ProxyError;

use crate::config::{ConfigError, ProxyConfig};
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{HeaderValue, HOST};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared proxy state: the backend pool plus one tuned HTTP client.
pub struct ProxyState {
    pool: Arc<BackendPool>,
    client: reqwest::Client,
    deadline: Duration,
}

impl ProxyState {
    pub fn new(pool: Arc<BackendPool>, config: &ProxyConfig) -> Self {
        Self {
            pool,
            client: build_client(config),
            deadline: config.deadline(),
        }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }
}

/// Client tuned for a short-hop network: HTTP/1.1 only (no multiplexing, so
/// tail latency stays predictable), a hot idle pool per backend, a short
/// dial timeout and a short read timeout so a stalled backend fails fast.
/// No decompression features are enabled, so response bytes pass through
/// unaltered.
fn build_client(config: &ProxyConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .http1_only()
        .pool_max_idle_per_host(1024)
        .pool_idle_timeout(Duration::from_secs(90))
        .connect_timeout(config.connect_timeout())
        .read_timeout(Duration::from_secs(2))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to build HTTP client")
}

/// Build the proxy router: every method and path lands in the same handler.
pub fn create_router(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// Proxy one request to a selected backend.
async fn handle(State(state): State<Arc<ProxyState>>, request: Request) -> Response {
    let Some(chosen) = state.pool.choose() else {
        metrics::counter!("paygate_proxy_errors_total", "kind" => "no_backend").increment(1);
        return ProxyError::NoBackends.into_response();
    };

    // Decremented on drop, so the count survives success, failure, and the
    // deadline path alike.
    let _guard = InFlightGuard::new(Arc::clone(&chosen));

    // The deadline composes with the inbound connection's own cancellation:
    // if the client goes away, this future is dropped and the upstream call
    // aborted with it.
    let result = tokio::time::timeout(state.deadline, forward(&state, &chosen, request)).await;

    match result {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            metrics::counter!("paygate_proxy_errors_total", "kind" => e.kind()).increment(1);
            tracing::debug!(backend = %chosen.host, error = %e, "proxied request failed");
            e.into_response()
        }
        Err(_) => {
            metrics::counter!("paygate_proxy_errors_total", "kind" => "timeout").increment(1);
            tracing::debug!(backend = %chosen.host, "proxied request hit deadline");
            ProxyError::Timeout.into_response()
        }
    }
}

async fn forward(
    state: &ProxyState,
    backend: &Backend,
    request: Request,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let mut url = backend.url.clone();
    url.set_path(&headers::single_joining_slash(
        backend.url.path(),
        parts.uri.path(),
    ));
    url.set_query(parts.uri.query());

    let mut out_headers = parts.headers;

    // Capture the original host before the rewrite below.
    let forwarded_host = out_headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.host().map(str::to_string));

    headers::strip_hop_headers(&mut out_headers);

    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        headers::append_forwarded_for(&mut out_headers, &addr.ip().to_string());
    }
    // Plain-HTTP listener only; there is no TLS leg to report.
    out_headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    if let Some(host) = forwarded_host {
        if let Ok(value) = HeaderValue::from_str(&host) {
            out_headers.insert("x-forwarded-host", value);
        }
    }
    // The backend's own host avoids virtual-host mismatches.
    if let Ok(value) = HeaderValue::from_str(&backend.host) {
        out_headers.insert(HOST, value);
    }

    let outbound = state
        .client
        .request(parts.method, url)
        .headers(out_headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .map_err(ProxyError::from_transport)?;

    let status = outbound.status();
    let mut response_headers = outbound.headers().clone();
    headers::strip_hop_headers(&mut response_headers);

    let mut response = Response::builder().status(status);
    if let Some(slot) = response.headers_mut() {
        *slot = response_headers;
    }
    response
        .body(Body::from_stream(outbound.bytes_stream()))
        .map_err(|e| ProxyError::Upstream(e.to_string()))
}

/// Run the load balancer until cancelled.
///
/// An empty backend list is fatal: the caller exits non-zero.
pub async fn run(config: &ProxyConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    if config.backends.is_empty() {
        return Err(ConfigError::MissingField("BACKENDS".to_string()).into());
    }

    let pool = Arc::new(BackendPool::from_urls(&config.backends)?);
    let state = Arc::new(ProxyState::new(Arc::clone(&pool), config));
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        backends = pool.len(),
        deadline_ms = config.deadline_ms,
        "load balancer listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { cancel_token.cancelled().await })
    .await?;

    Ok(())
}

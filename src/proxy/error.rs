//! Proxy error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failures surfaced directly to the client with a mapped status code.
/// The proxy never retries.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no backends")]
    NoBackends,

    #[error("gateway timeout")]
    Timeout,

    #[error("bad gateway")]
    Upstream(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NoBackends | ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Label for the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::NoBackends => "no_backend",
            ProxyError::Timeout => "timeout",
            ProxyError::Upstream(_) => "upstream",
        }
    }

    /// Classify a transport failure: timeouts become gateway-timeout,
    /// everything else bad-gateway.
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::Timeout
        } else {
            ProxyError::Upstream(e.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

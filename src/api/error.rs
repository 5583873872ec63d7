//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// Errors surfaced to gateway clients.
///
/// Transient upstream failures never appear here: the dispatcher absorbs
/// them with retry/fallback/requeue. A client only sees an error when intake
/// itself rejects or a query is malformed.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Payment queue is full")]
    QueueFull,

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidTimeRange(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::QueueFull => "queue_full",
            ApiError::InvalidTimeRange(_) => "invalid_time_range",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "code": self.code(),
            }
        });
        (self.status_code(), Json(body)).into_response()
    }
}

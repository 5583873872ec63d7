//! The payment request as it moves through the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A payment accepted from a client and owned by exactly one dispatch worker
/// at a time.
///
/// `requested_at` is stamped by the dispatcher immediately before each
/// outbound attempt so the recorded timestamp reflects actual send time, not
/// intake time. `routed_via_fallback` is bookkeeping for the summary split
/// and is never sent to an upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub correlation_id: Uuid,
    pub amount: f64,
    pub requested_at: DateTime<Utc>,
    #[serde(skip)]
    pub routed_via_fallback: bool,
}

impl PaymentRequest {
    /// Create a request as it enters the intake queue.
    pub fn new(correlation_id: Uuid, amount: f64) -> Self {
        Self {
            correlation_id,
            amount,
            requested_at: Utc::now(),
            routed_via_fallback: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_wire_fields_only() {
        let mut payment = PaymentRequest::new(Uuid::nil(), 19.90);
        payment.routed_via_fallback = true;

        let json = serde_json::to_value(&payment).unwrap();
        assert!(json.get("correlationId").is_some());
        assert!(json.get("amount").is_some());
        assert!(json.get("requestedAt").is_some());
        assert!(json.get("routedViaFallback").is_none());
    }

    #[test]
    fn deserializes_camel_case() {
        let payment: PaymentRequest = serde_json::from_str(
            r#"{"correlationId":"4a7901b8-7d0d-4d1b-abb8-95c1b3c1e0a1","amount":19.9,"requestedAt":"2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(payment.amount, 19.9);
        assert!(!payment.routed_via_fallback);
    }
}

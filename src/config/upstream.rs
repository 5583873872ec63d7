//! Upstream processor and peer node addresses

use serde::{Deserialize, Serialize};

/// Addresses of the two payment processors and the paired replica node.
///
/// Exactly one node in a pair runs the circuit decision engine; it is marked
/// with `master` (the `MASTER` environment variable). The other node only
/// receives pushed status updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the primary payment processor.
    pub primary_url: String,
    /// Base URL of the fallback payment processor.
    pub fallback_url: String,
    /// Base URL of the paired replica node. When unset, status propagation
    /// and cross-node summary merging are disabled.
    pub peer_url: Option<String>,
    /// Whether this node is the decision authority.
    pub master: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://payment-processor-default:8080".to_string(),
            fallback_url: "http://payment-processor-fallback:8080".to_string(),
            peer_url: None,
            master: false,
        }
    }
}

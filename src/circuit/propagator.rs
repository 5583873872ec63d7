//! Best-effort replication of the routing status to the paired node.

use super::sampler::PROBE_TIMEOUT;
use super::status::CircuitStatus;

/// Pushes status changes to the paired replica so both nodes route
/// consistently without a shared data store.
///
/// Pushes are fire-and-forget: each runs on a detached task so the decision
/// tick is never delayed, and failures are logged and dropped. The next
/// natural status change re-attempts propagation.
pub struct PeerPropagator {
    client: reqwest::Client,
    peer_url: String,
}

impl PeerPropagator {
    pub fn new(peer_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self::with_client(peer_url, client)
    }

    /// Create a propagator with a custom HTTP client (for testing).
    pub fn with_client(peer_url: impl Into<String>, client: reqwest::Client) -> Self {
        let peer_url = peer_url.into().trim_end_matches('/').to_string();
        Self { client, peer_url }
    }

    /// Push `status` to the peer's status-update endpoint.
    ///
    /// Returns immediately; the POST happens on a spawned task.
    pub fn notify(&self, status: CircuitStatus) {
        let client = self.client.clone();
        let url = format!("{}/circuit/{}", self.peer_url, status.as_u8());

        tokio::spawn(async move {
            match client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .send()
                .await
            {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(
                        url = %url,
                        http_status = %response.status(),
                        "peer rejected circuit status push"
                    );
                }
                Ok(_) => {
                    tracing::debug!(url = %url, status = %status, "circuit status pushed to peer");
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "circuit status push failed");
                }
            }
        });
    }
}

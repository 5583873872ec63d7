//! Upstream health probing and rolling latency windows.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Timeout applied to every health probe request.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Latency assumed for an upstream whose health endpoint is unreachable or
/// unparseable, in milliseconds.
pub const PESSIMISTIC_LATENCY_MS: u64 = 1000;

/// Latest health snapshot for one upstream. Overwritten on every poll; no
/// history is kept beyond this value.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceHealth {
    pub failing: bool,
    pub min_response_time: Duration,
    pub last_checked: DateTime<Utc>,
}

impl ServiceHealth {
    /// State before the first poll completes: not failing, zero latency.
    pub fn unknown() -> Self {
        Self {
            failing: false,
            min_response_time: Duration::ZERO,
            last_checked: Utc::now(),
        }
    }

    /// Synthesized when a probe fails in transport or decoding.
    pub fn pessimistic() -> Self {
        Self {
            failing: true,
            min_response_time: Duration::from_millis(PESSIMISTIC_LATENCY_MS),
            last_checked: Utc::now(),
        }
    }
}

/// Wire format of an upstream's health document.
#[derive(Debug, Deserialize)]
struct HealthDocument {
    failing: bool,
    #[serde(rename = "minResponseTime")]
    min_response_time: u64,
}

/// Probe an upstream's health endpoint.
///
/// Any transport or decode error degrades to the pessimistic default; this
/// never surfaces an error to the caller. `last_checked` is always stamped.
/// The call may block for up to the client's configured timeout.
pub async fn probe_health(client: &reqwest::Client, base_url: &str) -> ServiceHealth {
    let url = format!(
        "{}/payments/service-health",
        base_url.trim_end_matches('/')
    );

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "health probe failed");
            return ServiceHealth::pessimistic();
        }
    };

    match response.json::<HealthDocument>().await {
        Ok(doc) => ServiceHealth {
            failing: doc.failing,
            min_response_time: Duration::from_millis(doc.min_response_time),
            last_checked: Utc::now(),
        },
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "health probe returned undecodable body");
            ServiceHealth::pessimistic()
        }
    }
}

/// One dispatch attempt's telemetry, fed from the worker pool to the decision
/// engine over a bounded channel. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metric {
    pub used_primary: bool,
    pub duration_ms: u64,
    pub failed: bool,
}

/// Ordered, size-bounded sequence of recent latency samples for one upstream.
///
/// Oldest samples are evicted first once the window is full. A completed
/// health poll replaces the whole window with a single baseline sample, so
/// the window rebases after every refresh instead of decaying gradually.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append one sample, evicting the oldest when over capacity.
    pub fn record(&mut self, duration_ms: u64) {
        self.samples.push_back(duration_ms);
        if self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Discard all samples and seed the window with a single baseline.
    pub fn reset(&mut self, baseline_ms: u64) {
        self.samples.clear();
        self.samples.push_back(baseline_ms);
    }

    /// 95th percentile of the current samples, 0 when empty.
    ///
    /// Sorts a copy ascending and returns the value at rank
    /// `ceil(0.95 * n) - 1`, clamped at index 0. Recomputed fresh on every
    /// call; nothing is cached across ticks.
    pub fn percentile95(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let rank = ((0.95 * sorted.len() as f64).ceil() as usize).saturating_sub(1);
        sorted[rank]
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

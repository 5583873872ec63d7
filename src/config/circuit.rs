//! Circuit decision engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds and intervals for the circuit decision engine.
///
/// All values are static per-run configuration; the engine never adjusts them
/// at runtime.
///
/// # Example
///
/// ```toml
/// [circuit]
/// use_fallback = true
/// max_default_latency_ms = 100
/// failover_delay_secs = 15
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Whether traffic may ever be diverted to the fallback processor.
    pub use_fallback: bool,
    /// p95 latency budget for the primary processor, in milliseconds.
    pub max_default_latency_ms: u64,
    /// p95 latency budget for the fallback processor, in milliseconds.
    pub max_fallback_latency_ms: u64,
    /// Number of latency samples kept per upstream.
    pub sample_window: usize,
    /// Milliseconds between decision ticks.
    pub tick_interval_ms: u64,
    /// Milliseconds between health polls of both upstreams.
    pub health_interval_ms: u64,
    /// Seconds the primary must stay degraded before fallback is committed.
    pub failover_delay_secs: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            use_fallback: false,
            max_default_latency_ms: 100,
            max_fallback_latency_ms: 100,
            sample_window: 100,
            tick_interval_ms: 500,
            health_interval_ms: 5000,
            failover_delay_secs: 15,
        }
    }
}

impl CircuitConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn failover_delay(&self) -> Duration {
        Duration::from_secs(self.failover_delay_secs)
    }
}

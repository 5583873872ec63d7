//! Dispatch worker pool configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the payment dispatch worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of parallel dispatch workers.
    pub num_workers: usize,
    /// Maximum number of payments waiting in the intake queue. When full,
    /// intake rejects with a signaled error rather than growing unbounded.
    pub queue_capacity: usize,
    /// Milliseconds a worker sleeps after hitting an open circuit.
    pub open_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            num_workers: 10,
            queue_capacity: 3500,
            open_backoff_ms: 500,
        }
    }
}

impl DispatchConfig {
    pub fn open_backoff(&self) -> Duration {
        Duration::from_millis(self.open_backoff_ms)
    }
}

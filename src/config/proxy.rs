//! Load balancer configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the standalone reverse proxy.
///
/// `backends` is required for the proxy command; an empty list is fatal at
/// startup (exit with a non-zero status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Backend gateway replica base URLs.
    pub backends: Vec<String>,
    pub host: String,
    pub port: u16,
    /// Overall deadline applied to each proxied request, in milliseconds.
    pub deadline_ms: u64,
    /// Dial timeout towards a backend, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            host: "0.0.0.0".to_string(),
            port: 9999,
            deadline_ms: 1200,
            connect_timeout_ms: 250,
        }
    }
}

impl ProxyConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_defaults() {
        let config = ProxyConfig::default();
        assert!(config.backends.is_empty());
        assert_eq!(config.port, 9999);
        assert_eq!(config.deadline(), Duration::from_millis(1200));
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
    }
}

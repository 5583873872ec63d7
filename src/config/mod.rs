//! Configuration module for the gateway and the load balancer.
//!
//! Provides layered configuration loading from files, environment variables,
//! and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`USE_FALLBACK`, `MAX_DEFAULT_LATENCY`, ...)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use paygate::config::GatewayConfig;
//!
//! // Load defaults
//! let config = GatewayConfig::default();
//! assert_eq!(config.server.port, 8080);
//!
//! // Parse from TOML
//! let toml = r#"
//! [server]
//! port = 9000
//! "#;
//! let config: GatewayConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.server.port, 9000);
//! ```

pub mod circuit;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod upstream;

pub use circuit::CircuitConfig;
pub use dispatch::DispatchConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use proxy::ProxyConfig;
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for a gateway node and the load balancer binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Upstream processor and peer node addresses
    pub upstream: UpstreamConfig,
    /// Circuit decision engine thresholds and intervals
    pub circuit: CircuitConfig,
    /// Dispatch worker pool configuration
    pub dispatch: DispatchConfig,
    /// Load balancer configuration
    pub proxy: ProxyConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_bool("USE_FALLBACK") {
            self.circuit.use_fallback = v;
        }
        if let Some(v) = env_u64("MAX_DEFAULT_LATENCY") {
            self.circuit.max_default_latency_ms = v;
        }
        if let Some(v) = env_u64("MAX_FALLBACK_LATENCY") {
            self.circuit.max_fallback_latency_ms = v;
        }
        if let Some(v) = env_u64("SAMPLE_WINDOW") {
            self.circuit.sample_window = v as usize;
        }
        if let Some(v) = env_u64("TICK_INTERVAL_MS") {
            self.circuit.tick_interval_ms = v;
        }
        if let Some(v) = env_u64("HEALTH_INTERVAL_MS") {
            self.circuit.health_interval_ms = v;
        }
        if let Some(v) = env_u64("PRIMARY_FAILOVER_DELAY_SEC") {
            self.circuit.failover_delay_secs = v;
        }
        if let Some(v) = env_u64("NUM_WORKERS") {
            self.dispatch.num_workers = v as usize;
        }
        if let Some(v) = env_bool("MASTER") {
            self.upstream.master = v;
        }
        if let Ok(v) = std::env::var("PEER_URL") {
            if !v.trim().is_empty() {
                self.upstream.peer_url = Some(v.trim().to_string());
            }
        }
        if let Ok(v) = std::env::var("BACKENDS") {
            let parsed: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                self.proxy.backends = parsed;
            }
        }

        self
    }

    /// Validate gateway-side configuration. Proxy backends are validated
    /// separately by the proxy command since a gateway node needs none.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.num_workers == 0 {
            return Err(ConfigError::Validation {
                field: "dispatch.num_workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(ConfigError::Validation {
                field: "dispatch.queue_capacity".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.circuit.sample_window == 0 {
            return Err(ConfigError::Validation {
                field: "circuit.sample_window".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.upstream.primary_url.trim().is_empty() {
            return Err(ConfigError::MissingField("upstream.primary_url".to_string()));
        }
        if self.upstream.fallback_url.trim().is_empty() {
            return Err(ConfigError::MissingField(
                "upstream.fallback_url".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok()?.parse().ok()
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok()
}

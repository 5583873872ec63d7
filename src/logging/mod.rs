//! Structured logging setup.
//!
//! Builds tracing-subscriber filter directives from the logging configuration
//! and installs the global subscriber in either pretty or JSON format.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build filter directives string from LoggingConfig.
///
/// The configured base level applies to everything; `RUST_LOG` in the
/// environment takes precedence when set.
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    config.level.clone()
}

/// Initialize tracing based on configuration.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = build_filter_directives(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
    }

    Ok(())
}

//! Proxy command implementation

use crate::cli::serve::shutdown_signal;
use crate::cli::ProxyArgs;
use crate::config::GatewayConfig;
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ProxyArgs,
) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let mut config = if args.config.exists() {
        GatewayConfig::load(Some(&args.config))?
    } else {
        GatewayConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(port) = args.port {
        config.proxy.port = port;
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(ref raw) = args.backends {
        config.proxy.backends = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    Ok(config)
}

/// Main proxy command handler
pub async fn run_proxy(args: ProxyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config_with_overrides(&args)?;

    crate::logging::init_tracing(&config.logging)?;

    tracing::info!("Starting paygate load balancer");

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    crate::proxy::run(&config.proxy, cancel_token).await?;

    tracing::info!("load balancer stopped");
    Ok(())
}

//! Serve command implementation

use crate::api::{create_router, AppState};
use crate::circuit::{self, CircuitBreaker, PeerPropagator, StatusCell};
use crate::cli::ServeArgs;
use crate::config::GatewayConfig;
use crate::dispatch::{DispatcherPool, PaymentQueue};
use crate::store::{self, PaymentStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Load configuration with CLI overrides
pub fn load_config_with_overrides(
    args: &ServeArgs,
) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    // Load from file if it exists, otherwise use defaults
    let mut config = if args.config.exists() {
        GatewayConfig::load(Some(&args.config))?
    } else {
        GatewayConfig::default()
    };

    // Apply environment variable overrides
    config = config.with_env_overrides();

    // Apply CLI overrides (highest priority)
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(ref host) = args.host {
        config.server.host = host.clone();
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
pub(crate) async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }

    cancel_token.cancel();
}

/// Main serve command handler
pub async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and merge configuration
    let config = load_config_with_overrides(&args)?;
    config.validate()?;

    // 2. Initialize tracing
    crate::logging::init_tracing(&config.logging)?;

    tracing::info!("Starting paygate gateway node");
    tracing::debug!(?config, "Loaded configuration");

    let config = Arc::new(config);

    // 3. Shared state: routing status cell, intake queue, payment store
    let status = Arc::new(StatusCell::default());
    let queue = Arc::new(PaymentQueue::new(config.dispatch.queue_capacity));
    let store = Arc::new(PaymentStore::new());
    let (save_tx, save_rx) = store::save_channel();

    let cancel_token = CancellationToken::new();

    // 4. Saver task: the single append path into the store
    let saver_handle = store::start_saver(Arc::clone(&store), save_rx, cancel_token.clone());

    // 5. Telemetry and the decision engine exist only on the authority node
    let (metrics_tx, engine_handle) = if config.upstream.master {
        let (tx, rx) = circuit::metrics_channel();
        let propagator = config
            .upstream
            .peer_url
            .as_ref()
            .map(|url| PeerPropagator::new(url.clone()));
        if propagator.is_none() {
            tracing::info!("no peer configured, circuit status will not propagate");
        }

        tracing::info!("starting circuit decision engine (decision authority)");
        let engine = CircuitBreaker::new(
            config.circuit.clone(),
            &config.upstream,
            Arc::clone(&status),
            rx,
            propagator,
        );
        (Some(tx), Some(engine.start(cancel_token.clone())))
    } else {
        tracing::info!("replica node, awaiting circuit status pushes from the authority");
        (None, None)
    };

    // 6. Dispatch worker pool
    let pool = Arc::new(DispatcherPool::new(
        config.dispatch.clone(),
        &config.circuit,
        &config.upstream,
        Arc::clone(&queue),
        Arc::clone(&status),
        save_tx,
        metrics_tx,
    ));
    let worker_handles = pool.start(cancel_token.clone());

    // 7. Bind and serve
    let state = Arc::new(AppState::new(
        Arc::clone(&queue),
        Arc::clone(&status),
        Arc::clone(&store),
        Arc::clone(&config),
    ));
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "gateway API listening");

    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let serve_cancel = cancel_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_cancel.cancelled().await })
        .await?;

    // 8. Drain background tasks
    cancel_token.cancel();
    futures::future::join_all(worker_handles).await;
    if let Some(handle) = engine_handle {
        let _ = handle.await;
    }
    let _ = saver_handle.await;

    tracing::info!("gateway stopped");
    Ok(())
}

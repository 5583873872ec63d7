//! Circuit decision engine.
//!
//! Continuously samples upstream health and latency, derives a tri-state
//! routing status on a fixed tick, publishes it to a process-wide shared
//! cell, and replicates changes to the paired node.

mod propagator;
mod sampler;
mod status;


pub use propagator::PeerPropagator;
pub use sampler::{
    probe_health, LatencyWindow, Metric, ServiceHealth, PESSIMISTIC_LATENCY_MS, PROBE_TIMEOUT,
};
pub use status::{CircuitStatus, StatusCell};

use crate::config::{CircuitConfig, UpstreamConfig};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Capacity of the dispatch-to-engine telemetry channel. Overflow drops the
/// sample with a warning so dispatch never blocks on telemetry.
const METRICS_CHANNEL_CAPACITY: usize = 2000;

/// Create the bounded telemetry channel between dispatch workers and the
/// decision engine.
pub fn metrics_channel() -> (mpsc::Sender<Metric>, mpsc::Receiver<Metric>) {
    mpsc::channel(METRICS_CHANNEL_CAPACITY)
}

/// Health snapshot plus rolling latency window for one upstream.
///
/// Owned exclusively by the engine task; nothing mutates these concurrently.
#[derive(Debug)]
struct UpstreamTrack {
    health: ServiceHealth,
    window: LatencyWindow,
}

impl UpstreamTrack {
    fn new(window_size: usize) -> Self {
        Self {
            health: ServiceHealth::unknown(),
            window: LatencyWindow::new(window_size),
        }
    }
}

/// Background task that derives the authoritative [`CircuitStatus`].
///
/// Runs three concerns on one task via `select!`: draining dispatch
/// telemetry into the latency windows, re-probing both upstreams on the
/// health interval (which rebases the windows), and evaluating the state
/// machine on the decision tick. The tick timer is independent of dispatch
/// latency; probes block only this task, never the workers.
pub struct CircuitBreaker {
    config: CircuitConfig,
    primary_url: String,
    fallback_url: String,
    client: reqwest::Client,
    status: Arc<StatusCell>,
    metrics_rx: mpsc::Receiver<Metric>,
    metrics_closed: bool,
    propagator: Option<PeerPropagator>,
    primary: UpstreamTrack,
    fallback: UpstreamTrack,
    /// First instant the fallback-eligibility condition held, if it still
    /// holds. Cleared whenever the primary recovers.
    eligible_since: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(
        config: CircuitConfig,
        upstream: &UpstreamConfig,
        status: Arc<StatusCell>,
        metrics_rx: mpsc::Receiver<Metric>,
        propagator: Option<PeerPropagator>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        let window_size = config.sample_window;
        Self {
            config,
            primary_url: upstream.primary_url.clone(),
            fallback_url: upstream.fallback_url.clone(),
            client,
            status,
            metrics_rx,
            metrics_closed: false,
            propagator,
            primary: UpstreamTrack::new(window_size),
            fallback: UpstreamTrack::new(window_size),
            eligible_since: None,
        }
    }

    /// Append a dispatch sample into the matching upstream's window.
    fn record_metric(&mut self, metric: Metric) {
        let track = if metric.used_primary {
            &mut self.primary
        } else {
            &mut self.fallback
        };
        track.window.record(metric.duration_ms);
    }

    /// Re-probe both upstreams and rebase each window to the probe's
    /// reported minimum response time, discarding prior samples.
    async fn refresh_health(&mut self) {
        let health = probe_health(&self.client, &self.primary_url).await;
        self.primary
            .window
            .reset(health.min_response_time.as_millis() as u64);
        self.primary.health = health;

        let health = probe_health(&self.client, &self.fallback_url).await;
        self.fallback
            .window
            .reset(health.min_response_time.as_millis() as u64);
        self.fallback.health = health;

        tracing::debug!(
            primary_failing = self.primary.health.failing,
            fallback_failing = self.fallback.health.failing,
            "upstream health refreshed"
        );
    }

    /// Derive the status for one tick.
    ///
    /// When both upstreams report failing, the eligibility timer is cleared
    /// and the result falls through to `Primary`. That fallthrough is
    /// reproduced deliberately; see DESIGN.md.
    fn evaluate(&mut self, now: Instant) -> CircuitStatus {
        let p95_primary = self.primary.window.percentile95();
        let p95_fallback = self.fallback.window.percentile95();

        let mut status = CircuitStatus::Primary;

        if self.primary.health.failing && self.fallback.health.failing {
            self.eligible_since = None;
            return status;
        }

        let primary_degraded = (p95_primary > 0
            && p95_primary > self.config.max_default_latency_ms)
            || self.primary.health.failing;

        if primary_degraded {
            if self.config.use_fallback && !self.fallback.health.failing {
                let since = *self.eligible_since.get_or_insert(now);
                status = if now.duration_since(since) >= self.config.failover_delay() {
                    CircuitStatus::Fallback
                } else {
                    CircuitStatus::Open
                };
            } else {
                status = CircuitStatus::Open;
                self.eligible_since = None;
            }
        } else {
            self.eligible_since = None;
        }

        // Fallback itself too slow to accept traffic.
        if status == CircuitStatus::Fallback
            && p95_fallback > 0
            && p95_fallback > self.config.max_fallback_latency_ms
        {
            status = CircuitStatus::Open;
            self.eligible_since = None;
        }

        status
    }

    /// Evaluate and, on change, publish to the shared cell and fire the
    /// peer propagator.
    fn tick(&mut self, now: Instant) {
        let status = self.evaluate(now);
        let published = self.status.load();

        if status != published {
            tracing::info!(old = %published, new = %status, "circuit status changed");
            if let Some(propagator) = &self.propagator {
                propagator.notify(status);
            }
            self.status.store(status);
            metrics::gauge!("paygate_circuit_status").set(status.as_u8() as f64);
        }
    }

    /// Start the engine background task.
    /// Returns a JoinHandle that resolves when the engine stops.
    pub fn start(mut self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.config.tick_interval());
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            // The initial probe runs before the loop; the ticker starts one
            // full interval later.
            let mut health_tick = tokio::time::interval_at(
                tokio::time::Instant::now() + self.config.health_interval(),
                self.config.health_interval(),
            );
            health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            self.refresh_health().await;

            tracing::info!(
                tick_ms = self.config.tick_interval_ms,
                health_ms = self.config.health_interval_ms,
                "circuit decision engine started"
            );

            enum Event {
                Shutdown,
                Metric(Option<Metric>),
                Health,
                Decide,
            }

            loop {
                // Borrows taken by the branch futures end with the select
                // expression, freeing `self` for the handling below.
                let event = tokio::select! {
                    _ = cancel_token.cancelled() => Event::Shutdown,
                    maybe = self.metrics_rx.recv(), if !self.metrics_closed => {
                        Event::Metric(maybe)
                    }
                    _ = health_tick.tick() => Event::Health,
                    _ = tick.tick() => Event::Decide,
                };

                match event {
                    Event::Shutdown => {
                        tracing::info!("circuit decision engine shutting down");
                        break;
                    }
                    Event::Metric(Some(metric)) => self.record_metric(metric),
                    Event::Metric(None) => self.metrics_closed = true,
                    Event::Health => self.refresh_health().await,
                    Event::Decide => self.tick(Instant::now()),
                }
            }
        })
    }
}

//! Payment dispatch worker pool.
//!
//! Drains the intake queue and gets each payment to an upstream processor,
//! observing the shared circuit status. Failures while targeting the primary
//! get one inline fallback attempt; anything still undelivered is returned to
//! the queue for a later pass.

mod error;
mod queue;

pub use error::DispatchError;
pub use queue::PaymentQueue;

use crate::circuit::{CircuitStatus, Metric, StatusCell, PESSIMISTIC_LATENCY_MS};
use crate::config::{CircuitConfig, DispatchConfig, UpstreamConfig};
use crate::payment::PaymentRequest;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Which processor an attempt is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Primary,
    Fallback,
}

impl Target {
    fn label(self) -> &'static str {
        match self {
            Target::Primary => "primary",
            Target::Fallback => "fallback",
        }
    }
}

/// Pool of parallel workers that deliver queued payments.
///
/// Telemetry is emitted per attempt, but only on the node acting as decision
/// authority: `metrics_tx` is `None` elsewhere, so a replica never pollutes
/// the authority's sampling feed with traffic it never saw.
pub struct DispatcherPool {
    queue: Arc<PaymentQueue>,
    status: Arc<StatusCell>,
    client: reqwest::Client,
    primary_url: String,
    fallback_url: String,
    metrics_tx: Option<mpsc::Sender<Metric>>,
    save_tx: mpsc::Sender<PaymentRequest>,
    config: DispatchConfig,
}

impl DispatcherPool {
    pub fn new(
        config: DispatchConfig,
        circuit: &CircuitConfig,
        upstream: &UpstreamConfig,
        queue: Arc<PaymentQueue>,
        status: Arc<StatusCell>,
        save_tx: mpsc::Sender<PaymentRequest>,
        metrics_tx: Option<mpsc::Sender<Metric>>,
    ) -> Self {
        // Twice the primary latency budget bounds every payment POST.
        let timeout = Duration::from_millis(circuit.max_default_latency_ms * 2);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            queue,
            status,
            client,
            primary_url: upstream.primary_url.clone(),
            fallback_url: upstream.fallback_url.clone(),
            metrics_tx,
            save_tx,
            config,
        }
    }

    /// Spawn the worker tasks. Each resolves when cancelled or when the
    /// queue closes.
    pub fn start(self: Arc<Self>, cancel_token: CancellationToken) -> Vec<JoinHandle<()>> {
        tracing::info!(workers = self.config.num_workers, "dispatch pool starting");
        (0..self.config.num_workers)
            .map(|worker_id| {
                let pool = Arc::clone(&self);
                let cancel = cancel_token.clone();
                tokio::spawn(async move {
                    pool.worker_loop(worker_id, cancel).await;
                })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize, cancel_token: CancellationToken) {
        tracing::debug!(worker_id, "dispatch worker started");
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                maybe = self.queue.pop() => {
                    match maybe {
                        Some(payment) => self.handle_payment(payment).await,
                        None => break,
                    }
                }
            }
        }
        tracing::debug!(worker_id, "dispatch worker stopped");
    }

    /// Drive one payment through the per-request state machine:
    /// `Queued -> Dispatching -> {Saved, FallbackAttempted -> {Saved,
    /// Requeued}, Requeued(open)}`.
    async fn handle_payment(&self, mut payment: PaymentRequest) {
        match self.status.load() {
            CircuitStatus::Open => {
                // The request stays deliverable for when the circuit
                // improves; it is never silently discarded.
                self.requeue(payment);
                tokio::time::sleep(self.config.open_backoff()).await;
            }
            status => {
                let target = if status == CircuitStatus::Fallback {
                    Target::Fallback
                } else {
                    Target::Primary
                };

                if self.try_process(&mut payment, target).await {
                    if target == Target::Fallback {
                        payment.routed_via_fallback = true;
                    }
                    self.save(payment).await;
                } else if target == Target::Primary {
                    // One inline fallback attempt with a fresh serialization.
                    if self.try_process(&mut payment, Target::Fallback).await {
                        payment.routed_via_fallback = true;
                        self.save(payment).await;
                    } else {
                        self.emit_metric(Metric {
                            used_primary: true,
                            duration_ms: PESSIMISTIC_LATENCY_MS,
                            failed: true,
                        });
                        self.requeue(payment);
                    }
                } else {
                    self.requeue(payment);
                }
            }
        }
    }

    /// POST the payment to the targeted processor and measure the round
    /// trip. Success means HTTP 200 exactly.
    ///
    /// The body is re-serialized on every call, so a retry or inline
    /// fallback never reuses a consumed body, and `requested_at` reflects
    /// this attempt's actual send time.
    async fn try_process(&self, payment: &mut PaymentRequest, target: Target) -> bool {
        let base = match target {
            Target::Primary => &self.primary_url,
            Target::Fallback => &self.fallback_url,
        };
        let url = format!("{}/payments", base.trim_end_matches('/'));

        payment.requested_at = Utc::now();

        let start = Instant::now();
        let result = self.client.post(&url).json(payment).send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let failed = match &result {
            Ok(response) => response.status() != reqwest::StatusCode::OK,
            Err(_) => true,
        };

        self.emit_metric(Metric {
            used_primary: target == Target::Primary,
            duration_ms,
            failed,
        });

        metrics::histogram!("paygate_dispatch_duration_seconds",
            "upstream" => target.label()
        )
        .record(duration_ms as f64 / 1000.0);

        if failed {
            metrics::counter!("paygate_dispatch_failures_total",
                "upstream" => target.label()
            )
            .increment(1);
            match result {
                Ok(response) => tracing::debug!(
                    correlation_id = %payment.correlation_id,
                    upstream = target.label(),
                    http_status = %response.status(),
                    "payment dispatch rejected"
                ),
                Err(e) => tracing::debug!(
                    correlation_id = %payment.correlation_id,
                    upstream = target.label(),
                    error = %e,
                    "payment dispatch failed"
                ),
            }
        }

        !failed
    }

    /// Send a telemetry sample to the decision engine, if this node runs it.
    /// The channel is bounded; a full channel drops the sample with a signal
    /// rather than blocking dispatch.
    fn emit_metric(&self, metric: Metric) {
        if let Some(tx) = &self.metrics_tx {
            if tx.try_send(metric).is_err() {
                tracing::warn!("telemetry channel full, dropping dispatch sample");
            }
        }
    }

    /// Return an undelivered payment to the queue. A full queue here is the
    /// fatal backpressure condition: surfaced loudly, never swallowed.
    fn requeue(&self, payment: PaymentRequest) {
        let correlation_id = payment.correlation_id;
        if let Err(e) = self.queue.push(payment) {
            metrics::counter!("paygate_requeue_failures_total").increment(1);
            tracing::error!(
                %correlation_id,
                error = %e,
                "queue full while returning undelivered payment; payment lost"
            );
        }
    }

    async fn save(&self, payment: PaymentRequest) {
        if self.save_tx.send(payment).await.is_err() {
            tracing::warn!("save channel closed, dropping completed payment");
        }
    }
}

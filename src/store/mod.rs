//! In-memory storage of completed payments.
//!
//! Readers (summary queries) take a shared lock; the single append path (the
//! saver task) takes the exclusive lock. Nothing survives a restart.

use crate::payment::PaymentRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Capacity of the worker-to-saver channel.
const SAVE_CHANNEL_CAPACITY: usize = 10_000;

/// Create the bounded channel between dispatch workers and the saver task.
pub fn save_channel() -> (mpsc::Sender<PaymentRequest>, mpsc::Receiver<PaymentRequest>) {
    mpsc::channel(SAVE_CHANNEL_CAPACITY)
}

/// Aggregate figures for one routing class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBucket {
    pub total_requests: u64,
    pub total_amount: f64,
}

/// Completed-payment totals split by routing class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub default: SummaryBucket,
    pub fallback: SummaryBucket,
}

impl PaymentSummary {
    /// Fold another node's summary into this one.
    pub fn merge(&mut self, other: &PaymentSummary) {
        self.default.total_requests += other.default.total_requests;
        self.default.total_amount += other.default.total_amount;
        self.fallback.total_requests += other.fallback.total_requests;
        self.fallback.total_amount += other.fallback.total_amount;
    }
}

/// Append-only collection of completed payments.
pub struct PaymentStore {
    records: RwLock<Vec<PaymentRequest>>,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn append(&self, payment: PaymentRequest) {
        self.records
            .write()
            .expect("payment store lock poisoned")
            .push(payment);
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .expect("payment store lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Totals for payments whose send time falls inside `[from, to]`,
    /// bounds inclusive.
    pub fn summarize(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> PaymentSummary {
        let records = self.records.read().expect("payment store lock poisoned");

        let mut summary = PaymentSummary::default();
        for payment in records.iter() {
            if payment.requested_at >= from && payment.requested_at <= to {
                let bucket = if payment.routed_via_fallback {
                    &mut summary.fallback
                } else {
                    &mut summary.default
                };
                bucket.total_requests += 1;
                bucket.total_amount += payment.amount;
            }
        }
        summary
    }
}

impl Default for PaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the saver task: the sole append path into the store.
pub fn start_saver(
    store: Arc<PaymentStore>,
    mut rx: mpsc::Receiver<PaymentRequest>,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    // Flush whatever the workers already handed off.
                    while let Ok(payment) = rx.try_recv() {
                        store.append(payment);
                    }
                    break;
                }
                maybe = rx.recv() => {
                    match maybe {
                        Some(payment) => store.append(payment),
                        None => break,
                    }
                }
            }
        }
        tracing::debug!("payment saver stopped");
    })
}

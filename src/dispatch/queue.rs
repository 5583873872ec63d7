//! Bounded payment intake queue.
//!
//! Ownership of a queued payment passes to exactly one worker at a time.
//! Producers are never blocked: a full queue rejects with a signaled error
//! and the caller decides what that means (intake maps it to HTTP 503, a
//! worker requeue treats it as the fatal backpressure condition).

use super::error::DispatchError;
use crate::payment::PaymentRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex};

/// Bounded FIFO queue between request intake and the dispatch workers.
pub struct PaymentQueue {
    tx: mpsc::Sender<PaymentRequest>,
    rx: Mutex<mpsc::Receiver<PaymentRequest>>,
    depth: AtomicUsize,
    capacity: usize,
}

impl PaymentQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            depth: AtomicUsize::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue a payment. Returns `DispatchError::QueueFull` at capacity.
    pub fn push(&self, payment: PaymentRequest) -> Result<(), DispatchError> {
        // Incremented before the send so a consumer can never observe an
        // item whose depth accounting hasn't landed yet.
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.try_send(payment).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(DispatchError::QueueFull {
                capacity: self.capacity,
            });
        }
        metrics::gauge!("paygate_queue_depth").set(depth as f64);
        Ok(())
    }

    /// Wait for the next payment. Returns `None` once all producers are gone
    /// and the queue has drained.
    pub async fn pop(&self) -> Option<PaymentRequest> {
        let payment = {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };
        if payment.is_some() {
            let depth = self.depth.fetch_sub(1, Ordering::SeqCst) - 1;
            metrics::gauge!("paygate_queue_depth").set(depth as f64);
        }
        payment
    }

    /// Current queue depth.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

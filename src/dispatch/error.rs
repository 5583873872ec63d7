//! Dispatch error types

use thiserror::Error;

/// Errors from the payment queue and dispatch pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Queue is at capacity; the producer is signaled instead of blocked.
    #[error("Payment queue is full ({capacity} requests)")]
    QueueFull { capacity: usize },

    /// Upstream POST failed in transport or returned a non-success status.
    #[error("Upstream dispatch failed: {0}")]
    Upstream(String),
}

//! Shared routing status cell.

use std::sync::atomic::{AtomicU8, Ordering};

/// The routing mode derived by the decision engine.
///
/// The numeric values are part of the peer protocol (`POST /circuit/<status>`)
/// and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitStatus {
    /// Route payments to the primary processor.
    Primary = 0,
    /// Route payments to the fallback processor.
    Fallback = 1,
    /// Hold traffic; neither upstream should receive payments right now.
    Open = 2,
}

impl CircuitStatus {
    /// Decode a wire value. Unknown values map to `Primary`, matching the
    /// receiving route's lenient handling of malformed pushes.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitStatus::Fallback,
            2 => CircuitStatus::Open,
            _ => CircuitStatus::Primary,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for CircuitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitStatus::Primary => write!(f, "primary"),
            CircuitStatus::Fallback => write!(f, "fallback"),
            CircuitStatus::Open => write!(f, "open"),
        }
    }
}

/// Process-wide shared status: one writer (the decision engine), many
/// concurrent readers (dispatch workers, routes). Readers never block the
/// writer and may observe a value stale by at most one tick, never a torn
/// one.
///
/// The cell is passed around explicitly behind an `Arc`; nothing in the crate
/// holds it as a global.
#[derive(Debug)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    pub fn new(initial: CircuitStatus) -> Self {
        Self(AtomicU8::new(initial.as_u8()))
    }

    pub fn load(&self) -> CircuitStatus {
        CircuitStatus::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn store(&self, status: CircuitStatus) {
        self.0.store(status.as_u8(), Ordering::SeqCst);
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new(CircuitStatus::Primary)
    }
}

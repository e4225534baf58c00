//! In-flight exchange tracking.
//!
//! # Responsibilities
//! - Count exchanges from routing until the relay ends
//! - Report how many relays a shutdown deadline abandoned
//! - Feed the in-flight gauge
//!
//! # Design Decisions
//! - RAII guard: the count cannot drift when a relay panics or is dropped
//! - The gauge moves by increments, so concurrent guards cannot leave it stale

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Global counter for exchange IDs.
static EXCHANGE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub fn new() -> Self {
        Self(EXCHANGE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ExchangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "xchg-{}", self.0)
    }
}

/// Tracks in-flight exchanges for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active: Arc<AtomicU64>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new exchange. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        metrics::exchange_started();
        InFlightGuard {
            active: Arc::clone(&self.active),
            id: ExchangeId::new(),
        }
    }

    /// Current in-flight exchange count.
    pub fn active_count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }
}

/// Guard that tracks one exchange's lifetime.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<AtomicU64>,
    id: ExchangeId,
}

impl InFlightGuard {
    pub fn id(&self) -> ExchangeId {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        metrics::exchange_finished();
        tracing::trace!(exchange_id = %self.id, "Exchange finished");
    }
}

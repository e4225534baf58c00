//! Bounded upstream connection admission.
//!
//! # Responsibilities
//! - Enforce the ceiling on concurrently acquired upstream connections
//! - Bound the wait for a free slot by the connect timeout
//! - Release slots on drop, whatever ends the exchange
//!
//! # Design Decisions
//! - A semaphore counts slots; hyper-util's pool owns the sockets themselves
//!   and keeps up to `max_idle_connections` of them alive between exchanges
//! - A permit lives as long as the exchange (head + body), so an aborted
//!   relay gives its slot back the moment it is dropped
//! - Closing the pool wakes every waiter with an error
//! - The in-use gauge moves with the permit itself, up on acquire and down
//!   on drop

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Error type for slot acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// No slot became free within the acquire timeout.
    #[error("connection pool exhausted ({max} in use) after waiting {waited:?}")]
    Exhausted { max: usize, waited: Duration },
    /// The pool has been closed for shutdown.
    #[error("connection pool is closed, gateway shutting down")]
    Closed,
}

/// A bounded set of upstream connection slots.
#[derive(Debug)]
pub struct ConnectionPool {
    slots: Arc<Semaphore>,
    max_connections: usize,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(max_connections: usize, acquire_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            acquire_timeout,
        }
    }

    /// Wait for a free slot, at most `acquire_timeout`.
    pub async fn acquire(&self) -> Result<PoolPermit, PoolError> {
        let acquire = Arc::clone(&self.slots).acquire_owned();
        match tokio::time::timeout(self.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => {
                metrics::pool_slot_acquired();
                tracing::trace!(in_use = self.in_use(), max = self.max_connections, "Pool slot acquired");
                Ok(PoolPermit { _permit: permit })
            }
            Ok(Err(_)) => Err(PoolError::Closed),
            Err(_) => Err(PoolError::Exhausted {
                max: self.max_connections,
                waited: self.acquire_timeout,
            }),
        }
    }

    /// Slots currently held by exchanges.
    pub fn in_use(&self) -> usize {
        self.max_connections
            .saturating_sub(self.slots.available_permits())
    }

    /// Refuse further acquisitions. Held permits stay valid until dropped.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }
}

/// A held upstream connection slot.
///
/// When dropped, the slot is released back to the pool.
/// This keeps the ceiling intact even if the relay task panics.
#[derive(Debug)]
pub struct PoolPermit {
    _permit: OwnedSemaphorePermit,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        metrics::pool_slot_released();
    }
}

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Resolve config → Init logging → Build runtime → Build client → Bind
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain relays (deadline) → Close pool
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Config is resolved before anything that logs or binds
//! - Shutdown order is stop accepting, drain relays, close the upstream pool
//! - Draining is bounded by `timeouts.shutdown_ms`; what is left is abandoned

pub mod inflight;
pub mod shutdown;
pub mod signals;

pub use inflight::{ExchangeId, InFlightGuard, InFlightTracker};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{spawn_signal_listener, wait_for_signal};

//! Upstream (inference backend) subsystem.
//!
//! # Data Flow
//! ```text
//! RouteDecision
//!     → client.rs (build absolute URL, acquire slot)
//!     → pool.rs (slot ceiling, bounded wait)
//!     → hyper-util Client (keepalive sockets, connect timeout)
//!     → UpstreamResponse { status, headers, body.rs } | error.rs
//! ```

pub mod body;
pub mod client;
pub mod error;
pub mod pool;

pub use body::UpstreamBody;
pub use client::{ClientBuildError, UpstreamClient, UpstreamOutcome, UpstreamResponse};
pub use error::{FailureKind, UpstreamError};
pub use pool::{ConnectionPool, PoolError, PoolPermit};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest (entry point, method, headers, query, body)
//!     → matcher.rs (body shape, generic entry only)
//!     → router.rs (target path, method, forwardable headers)
//!     → Return: RouteDecision
//! ```
//!
//! # Design Decisions
//! - Routing table built at startup, immutable at runtime
//! - Deterministic: same input always yields the same decision
//! - Ambiguity resolves to a documented default, never to an error

pub mod entry;
pub mod matcher;
pub mod router;

pub use entry::EntryPoint;
pub use matcher::{classify_body, BodyShape};
pub use router::{forwardable_headers, RequestRouter, RouteDecision, RouteTarget};

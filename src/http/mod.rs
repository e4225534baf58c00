//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, entry points)
//!     → request.rs (capture body once, request ID)
//!     → [routing layer decides upstream path]
//!     → [upstream client performs the exchange]
//!     → relay.rs (stream the backend answer back chunk by chunk)
//!     → response.rs (header filtering, fault responses)
//! ```

pub mod relay;
pub mod request;
pub mod response;
pub mod server;

pub use relay::{relay, RelayContext};
pub use request::{InboundRequest, MakeRequestUuid, X_REQUEST_ID};
pub use response::{fault_response, translate};
pub use server::{AppState, HttpServer};

//! Inbound request capture.
//!
//! # Responsibilities
//! - Snapshot method, headers, query and body into one immutable value
//! - Generate a unique request ID (UUID v4) when the caller sent none
//!
//! # Design Decisions
//! - The body is read exactly once, by the `Bytes` extractor, before any
//!   inspection; routing and forwarding only ever see the captured copy
//! - The query string is kept raw so ordering and repeated keys survive
//! - Request ID added as early as possible for tracing

use axum::http::{HeaderMap, HeaderValue, Method, Request};
use bytes::Bytes;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::routing::EntryPoint;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Immutable snapshot of one inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    entry: EntryPoint,
    method: Method,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
}

impl InboundRequest {
    pub fn new(
        entry: EntryPoint,
        method: Method,
        headers: HeaderMap,
        query: Option<String>,
        body: Bytes,
    ) -> Self {
        Self {
            entry,
            method,
            headers,
            query,
            body,
        }
    }

    pub fn entry(&self) -> EntryPoint {
        self.entry
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Correlation ID, or `"unknown"` outside the request-id middleware.
    pub fn request_id(&self) -> &str {
        self.headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

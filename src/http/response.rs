//! Response head handling and fault responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from the backend response
//! - Map upstream failure kinds to caller-facing status codes
//! - Render the single, non-streamed fault response
//!
//! # Design Decisions
//! - Backend timeouts result in 504 Gateway Timeout
//! - Refused connections and malformed exchanges result in 502 Bad Gateway
//! - Callers get a fixed message; URLs and transport details stay in the logs

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::upstream::{FailureKind, UpstreamError};

/// Response headers that belong to the backend connection only.
static HOP_BY_HOP_HEADERS: [HeaderName; 5] = [
    header::CONNECTION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const LEGACY_HOP_BY_HOP: &[&str] = &["keep-alive", "proxy-connection"];

/// Copy backend response headers, dropping hop-by-hop ones.
pub fn relayable_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if HOP_BY_HOP_HEADERS.contains(name) || LEGACY_HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// True when the backend is streaming server-sent events.
pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().starts_with("text/event-stream"))
        .unwrap_or(false)
}

/// Status code and message for a failure kind.
pub fn translate(kind: FailureKind) -> (StatusCode, &'static str) {
    match kind {
        FailureKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout: upstream did not respond in time"),
        FailureKind::ConnectError => (StatusCode::BAD_GATEWAY, "Bad Gateway: upstream is unreachable"),
        FailureKind::ProtocolError => (StatusCode::BAD_GATEWAY, "Bad Gateway: upstream returned an invalid response"),
    }
}

#[derive(Debug, Serialize)]
struct FaultBody {
    detail: &'static str,
    kind: &'static str,
}

/// Render the caller-facing response for a failed exchange.
pub fn fault_response(err: &UpstreamError) -> Response {
    let kind = err.kind();
    let (status, detail) = translate(kind);
    let body = serde_json::to_vec(&FaultBody {
        detail,
        kind: kind.as_str(),
    })
    .unwrap_or_default();

    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn translation_table() {
        assert_eq!(translate(FailureKind::Timeout).0, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(translate(FailureKind::ConnectError).0, StatusCode::BAD_GATEWAY);
        assert_eq!(translate(FailureKind::ProtocolError).0, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn fault_body_hides_transport_detail() {
        let err = UpstreamError::connect("http://10.0.0.1:8000/v1/completions", "tcp connect error: refused");
        let response = fault_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "connect_error");
        assert!(!json["detail"].as_str().unwrap().contains("10.0.0.1"));
    }

    #[tokio::test]
    async fn timeout_renders_504() {
        let err = UpstreamError::timeout("http://u/x", Duration::from_secs(1), "slow");
        let response = fault_response(&err);
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn hop_by_hop_response_headers_are_dropped() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        upstream.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        upstream.insert("x-backend", HeaderValue::from_static("vllm"));
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let out = relayable_headers(&upstream);
        assert!(is_event_stream(&out));
        assert!(out.get(header::TRANSFER_ENCODING).is_none());
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get("keep-alive").is_none());
        assert_eq!(out["x-backend"], "vllm");
        assert_eq!(out.get_all(header::SET_COOKIE).iter().count(), 2);
    }
}

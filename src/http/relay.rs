//! Incremental response relay.
//!
//! # Responsibilities
//! - Send the backend status and headers to the caller before the body
//! - Pull backend chunks one at a time and hand each to the caller in order
//! - End the caller's stream early when the backend fails mid-body
//! - Notice and log callers that disconnect mid-relay
//!
//! # Design Decisions
//! - One code path for event streams and single documents; streaming is a
//!   property of the data
//! - At most one chunk is held at a time; nothing is buffered
//! - A mid-stream failure never rewrites the status already sent, it aborts
//!   the body so the caller sees a truncated transfer
//! - Dropping the relay (caller gone) drops the backend body and its slot

use std::io;
use std::time::Instant;

use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use futures_util::stream;

use crate::http::response::{fault_response, is_event_stream, relayable_headers, translate};
use crate::lifecycle::InFlightGuard;
use crate::observability::metrics;
use crate::routing::{EntryPoint, RouteTarget};
use crate::upstream::{UpstreamBody, UpstreamOutcome, UpstreamResponse};

/// Per-exchange bookkeeping carried into the relay.
#[derive(Debug)]
pub struct RelayContext {
    pub request_id: String,
    pub entry: EntryPoint,
    pub target: RouteTarget,
    pub started: Instant,
    pub guard: InFlightGuard,
}

/// Turn an upstream outcome into the caller's response.
pub fn relay(outcome: UpstreamOutcome, ctx: RelayContext) -> Response {
    match outcome {
        Ok(upstream) => stream_response(upstream, ctx),
        Err(err) => {
            let kind = err.kind();
            let (status, _) = translate(kind);
            tracing::warn!(
                request_id = %ctx.request_id,
                exchange_id = %ctx.guard.id(),
                entry = %ctx.entry,
                kind = %kind,
                status = status.as_u16(),
                error = %err,
                "Upstream exchange failed"
            );
            metrics::record_upstream_failure(kind.as_str());
            metrics::record_request(ctx.entry.as_str(), status.as_u16(), ctx.started);
            fault_response(&err)
        }
    }
}

fn stream_response(upstream: UpstreamResponse, ctx: RelayContext) -> Response {
    let UpstreamResponse { status, headers, body } = upstream;
    let expected_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    tracing::info!(
        request_id = %ctx.request_id,
        exchange_id = %ctx.guard.id(),
        entry = %ctx.entry,
        target = ctx.target.as_str(),
        status = status.as_u16(),
        event_stream = is_event_stream(&headers),
        head_latency_ms = ctx.started.elapsed().as_millis() as u64,
        "Relaying upstream response"
    );
    metrics::record_request(ctx.entry.as_str(), status.as_u16(), ctx.started);

    let state = RelayState {
        body,
        request_id: ctx.request_id,
        started: ctx.started,
        expected_len,
        chunks: 0,
        bytes: 0,
        end: None,
        _guard: ctx.guard,
    };

    let mut response = Response::new(Body::from_stream(relay_stream(state)));
    *response.status_mut() = status;
    *response.headers_mut() = relayable_headers(&headers);
    response
}

fn relay_stream(state: RelayState) -> impl futures_util::Stream<Item = Result<bytes::Bytes, io::Error>> + Send {
    stream::unfold(state, |mut state| async move {
        match state.body.next_chunk().await {
            Some(Ok(chunk)) => {
                state.chunks += 1;
                state.bytes += chunk.len() as u64;
                Some((Ok(chunk), state))
            }
            Some(Err(err)) => {
                tracing::warn!(
                    request_id = %state.request_id,
                    kind = %err.kind(),
                    chunks = state.chunks,
                    bytes = state.bytes,
                    error = %err,
                    "Upstream failed mid-stream, terminating relay"
                );
                state.end = Some(RelayEnd::UpstreamFailed);
                Some((Err(io::Error::other(err)), state))
            }
            None => {
                state.end.get_or_insert(RelayEnd::Completed);
                None
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayEnd {
    Completed,
    UpstreamFailed,
}

/// Relay progress; its drop is the single place a relay's end is recorded.
struct RelayState {
    body: UpstreamBody,
    request_id: String,
    started: Instant,
    expected_len: Option<u64>,
    chunks: u64,
    bytes: u64,
    end: Option<RelayEnd>,
    _guard: InFlightGuard,
}

impl RelayState {
    fn end_state(&self) -> &'static str {
        match self.end {
            Some(RelayEnd::Completed) => "completed",
            Some(RelayEnd::UpstreamFailed) => "partial",
            // The server may stop polling once a sized body is fully written.
            None if self.expected_len == Some(self.bytes) => "completed",
            None => "disconnected",
        }
    }
}

impl Drop for RelayState {
    fn drop(&mut self) {
        let outcome = self.end_state();
        let duration_ms = self.started.elapsed().as_millis() as u64;
        match outcome {
            "disconnected" => tracing::info!(
                request_id = %self.request_id,
                upstream = %self.body.url(),
                chunks = self.chunks,
                bytes = self.bytes,
                duration_ms,
                "Caller disconnected mid-relay, upstream call cancelled"
            ),
            _ => tracing::debug!(
                request_id = %self.request_id,
                outcome,
                chunks = self.chunks,
                bytes = self.bytes,
                duration_ms,
                "Relay finished"
            ),
        }
        metrics::record_relay_outcome(outcome, self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::InFlightTracker;
    use crate::upstream::{ConnectionPool, UpstreamError};
    use axum::http::{HeaderMap, HeaderValue, StatusCode};
    use bytes::Bytes;
    use std::time::Duration;

    fn ctx(tracker: &InFlightTracker) -> RelayContext {
        RelayContext {
            request_id: "req-1".into(),
            entry: EntryPoint::Invoke,
            target: RouteTarget::ChatCompletions,
            started: Instant::now(),
            guard: tracker.track(),
        }
    }

    async fn upstream(
        pool: &ConnectionPool,
        status: StatusCode,
        parts: Vec<Result<Bytes, io::Error>>,
    ) -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        let body = Body::from_stream(stream::iter(parts));
        UpstreamResponse {
            status,
            headers,
            body: UpstreamBody::new(body, "http://u/x".into(), Duration::from_secs(1), pool.acquire().await.unwrap()),
        }
    }

    #[tokio::test]
    async fn failure_becomes_fault_response_and_releases_guard() {
        let tracker = InFlightTracker::new();
        let err = UpstreamError::timeout("http://u/x", Duration::from_millis(10), "slow");

        let response = relay(Err(err), ctx(&tracker));
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn chunks_are_relayed_verbatim() {
        let tracker = InFlightTracker::new();
        let pool = ConnectionPool::new(1, Duration::from_secs(1));
        let parts = vec![
            Ok(Bytes::from_static(b"data: {\"token\":\"he\"}\n\n")),
            Ok(Bytes::from_static(b"data: {\"token\":\"llo\"}\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
        ];
        let upstream = upstream(&pool, StatusCode::CREATED, parts).await;

        let response = relay(Ok(upstream), ctx(&tracker));
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert!(response.headers().get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(tracker.active_count(), 1);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            bytes,
            "data: {\"token\":\"he\"}\n\ndata: {\"token\":\"llo\"}\n\ndata: [DONE]\n\n"
        );
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_status_and_aborts_body() {
        let tracker = InFlightTracker::new();
        let pool = ConnectionPool::new(1, Duration::from_secs(1));
        let parts = vec![
            Ok(Bytes::from_static(b"data: partial\n\n")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "backend died")),
        ];
        let upstream = upstream(&pool, StatusCode::OK, parts).await;

        let response = relay(Ok(upstream), ctx(&tracker));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(axum::body::to_bytes(response.into_body(), usize::MAX).await.is_err());
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(pool.in_use(), 0);
    }

    #[tokio::test]
    async fn dropping_the_response_releases_everything() {
        let tracker = InFlightTracker::new();
        let pool = ConnectionPool::new(1, Duration::from_secs(1));
        let upstream = upstream(&pool, StatusCode::OK, vec![Ok(Bytes::from_static(b"x"))]).await;

        let response = relay(Ok(upstream), ctx(&tracker));
        assert_eq!(pool.in_use(), 1);
        drop(response);
        assert_eq!(tracker.active_count(), 0);
        assert_eq!(pool.in_use(), 0);
    }
}

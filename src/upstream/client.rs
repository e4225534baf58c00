//! The pooled HTTP client for the inference backend.
//!
//! # Responsibilities
//! - Own the keepalive connection pool (hyper-util) and the slot ceiling
//! - Issue one exchange per route decision
//! - Enforce connect and response-head deadlines
//! - Hand back status, headers and an unbuffered body
//!
//! # Design Decisions
//! - One instance per process, constructed from config and injected
//! - The slot is acquired before the request and travels with the body
//! - Errors are classified here and nowhere else
//! - Closing releases the transport, and with it every idle keepalive socket;
//!   exchanges already sent keep their own handle until they finish

use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use url::Url;

use crate::config::{PoolConfig, TimeoutConfig, UpstreamConfig};
use crate::routing::RouteDecision;
use crate::upstream::body::UpstreamBody;
use crate::upstream::error::UpstreamError;
use crate::upstream::pool::{ConnectionPool, PoolError};

/// Result of one upstream exchange.
pub type UpstreamOutcome = Result<UpstreamResponse, UpstreamError>;

/// Response head plus a body still streaming from the backend.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

/// Error building the client from configuration.
#[derive(Debug, thiserror::Error)]
#[error("invalid upstream base url {url:?}: {reason}")]
pub struct ClientBuildError {
    pub url: String,
    pub reason: String,
}

/// Pooled client bound to a single backend.
#[derive(Debug)]
pub struct UpstreamClient {
    base: String,
    transport: ArcSwapOption<Client<HttpConnector, Body>>,
    pool: ConnectionPool,
    connect_timeout: Duration,
    total_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        upstream: &UpstreamConfig,
        pool: &PoolConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, ClientBuildError> {
        let url = Url::parse(&upstream.base_url).map_err(|e| ClientBuildError {
            url: upstream.base_url.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "http" || url.host_str().is_none() {
            return Err(ClientBuildError {
                url: upstream.base_url.clone(),
                reason: "expected an http:// url with a host".to_string(),
            });
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeouts.connect()));
        connector.set_nodelay(true);
        connector.enforce_http(true);

        let transport = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(pool.max_idle_connections)
            .pool_idle_timeout(pool.idle_timeout())
            .pool_timer(TokioTimer::new())
            .build(connector);

        tracing::info!(
            base_url = %url,
            max_connections = pool.max_connections,
            max_idle_connections = pool.max_idle_connections,
            connect_timeout_ms = timeouts.connect_ms,
            total_timeout_ms = timeouts.total_ms,
            "Upstream client initialized"
        );

        Ok(Self {
            base: url.as_str().trim_end_matches('/').to_string(),
            transport: ArcSwapOption::from_pointee(transport),
            pool: ConnectionPool::new(pool.max_connections, timeouts.connect()),
            connect_timeout: timeouts.connect(),
            total_timeout: timeouts.total(),
        })
    }

    /// Absolute upstream URL for a decision.
    pub fn url_for(&self, decision: &RouteDecision) -> String {
        match &decision.query {
            Some(query) => format!("{}{}?{}", self.base, decision.path, query),
            None => format!("{}{}", self.base, decision.path),
        }
    }

    /// Perform one exchange.
    ///
    /// Dropping the returned future (caller went away) drops the in-flight
    /// request and its slot.
    pub async fn send(&self, decision: RouteDecision) -> UpstreamOutcome {
        let url = self.url_for(&decision);
        let started = Instant::now();

        let permit = self.pool.acquire().await.map_err(|e| match e {
            PoolError::Exhausted { waited, .. } => {
                UpstreamError::timeout(url.clone(), waited, e.to_string())
            }
            PoolError::Closed => UpstreamError::connect(url.clone(), e.to_string()),
        })?;

        let Some(transport) = self.transport.load_full() else {
            return Err(UpstreamError::connect(url, "upstream client is closed, gateway shutting down"));
        };
        let request = self.build_request(&url, decision)?;

        // Whatever the pool wait used comes out of the head deadline.
        let remaining = self.total_timeout.saturating_sub(started.elapsed());
        let response = match tokio::time::timeout(remaining, transport.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(UpstreamError::from_client(&url, &e, self.connect_timeout)),
            Err(_) => {
                return Err(UpstreamError::timeout(
                    url,
                    self.total_timeout,
                    "no response head received",
                ))
            }
        };

        let (parts, incoming) = response.into_parts();
        tracing::debug!(
            url = %url,
            status = %parts.status,
            head_latency_ms = started.elapsed().as_millis() as u64,
            "Upstream responded"
        );

        Ok(UpstreamResponse {
            status: parts.status,
            headers: parts.headers,
            body: UpstreamBody::new(Body::new(incoming), url, self.total_timeout, permit),
        })
    }

    fn build_request(&self, url: &str, decision: RouteDecision) -> Result<Request<Body>, UpstreamError> {
        let uri: Uri = url
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| UpstreamError::protocol(url, e.to_string()))?;

        let mut request = Request::builder()
            .method(decision.method)
            .uri(uri)
            .body(if decision.body.is_empty() {
                Body::empty()
            } else {
                Body::from(decision.body)
            })
            .map_err(|e| UpstreamError::protocol(url, e.to_string()))?;
        *request.headers_mut() = decision.headers;
        Ok(request)
    }

    /// Slot accounting for the pool ceiling.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Stop handing out slots and drop the transport so idle keepalive
    /// sockets are closed.
    pub fn close(&self) {
        self.pool.close();
        let released = self.transport.swap(None).is_some();
        tracing::info!(in_use = self.pool.in_use(), released, "Upstream pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed() && self.transport.load().is_none()
    }

    #[cfg(test)]
    fn transport_handle(&self) -> Option<std::sync::Arc<Client<HttpConnector, Body>>> {
        self.transport.load_full()
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the four entry points
//! - Wire up middleware (request ID, tracing, body limit)
//! - Capture each request once and hand it to routing
//! - Forward through the upstream client and relay the answer
//! - Own the upstream client's lifetime, including graceful drain

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, RawQuery, State},
    http::{HeaderMap, Method},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::relay::{relay, RelayContext};
use crate::http::request::{InboundRequest, MakeRequestUuid};
use crate::lifecycle::{InFlightTracker, ShutdownSignal};
use crate::routing::{EntryPoint, RequestRouter};
use crate::upstream::UpstreamClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub upstream: Arc<UpstreamClient>,
    pub inflight: InFlightTracker,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    upstream: Arc<UpstreamClient>,
    inflight: InFlightTracker,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let upstream = Arc::new(UpstreamClient::new(&config.upstream, &config.pool, &config.timeouts)?);
        let inflight = InFlightTracker::new();

        let state = AppState {
            router: Arc::new(RequestRouter::new(&config.upstream)),
            upstream: Arc::clone(&upstream),
            inflight: inflight.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            upstream,
            inflight,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/invocations", post(invocations))
            .route("/v1/chat/completions", post(chat_completions))
            .route("/v1/completions", post(completions))
            .route("/ping", get(health))
            .route("/health", get(health))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// On shutdown: stop accepting, give in-flight relays up to
    /// `timeouts.shutdown_ms` to finish, then close the upstream pool.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.upstream.base_url(),
            "HTTP server starting"
        );

        let (stopping_tx, stopping_rx) = oneshot::channel::<()>();
        let stop_accepting = async move {
            shutdown.recv().await;
            tracing::info!("Shutdown signal received, no longer accepting connections");
            let _ = stopping_tx.send(());
        };

        let grace = self.config.timeouts.shutdown();
        let drain_deadline = async move {
            match stopping_rx.await {
                Ok(()) => tokio::time::sleep(grace).await,
                Err(_) => std::future::pending::<()>().await,
            }
        };

        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(stop_accepting)
            .into_future();

        tokio::select! {
            result = serve => result?,
            _ = drain_deadline => {
                tracing::warn!(
                    in_flight = self.inflight.active_count(),
                    grace_ms = grace.as_millis() as u64,
                    "Shutdown deadline elapsed, abandoning in-flight relays"
                );
            }
        }

        self.upstream.close();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared handle on the upstream client (pool accounting).
    pub fn upstream(&self) -> Arc<UpstreamClient> {
        Arc::clone(&self.upstream)
    }

    pub fn inflight(&self) -> InFlightTracker {
        self.inflight.clone()
    }
}

async fn invocations(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    forward(state, InboundRequest::new(EntryPoint::Invoke, method, headers, query, body)).await
}

async fn chat_completions(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    forward(state, InboundRequest::new(EntryPoint::ChatCompletions, method, headers, query, body)).await
}

async fn completions(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    forward(state, InboundRequest::new(EntryPoint::Completions, method, headers, query, body)).await
}

/// `/ping` and `/health` share this handler.
async fn health(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    forward(state, InboundRequest::new(EntryPoint::Health, method, headers, query, body)).await
}

/// Route, forward and relay one captured request.
async fn forward(state: AppState, inbound: InboundRequest) -> Response {
    let started = Instant::now();
    let guard = state.inflight.track();
    let decision = state.router.decide(&inbound);

    tracing::debug!(
        request_id = %inbound.request_id(),
        exchange_id = %guard.id(),
        entry = %inbound.entry(),
        method = %decision.method,
        target = decision.target.as_str(),
        path = %decision.path,
        body_bytes = inbound.body().len(),
        "Forwarding request"
    );

    let ctx = RelayContext {
        request_id: inbound.request_id().to_string(),
        entry: inbound.entry(),
        target: decision.target,
        started,
        guard,
    };

    let outcome = state.upstream.send(decision).await;
    relay(outcome, ctx)
}

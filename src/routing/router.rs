//! Route decision.
//!
//! # Responsibilities
//! - Map an entry point + captured request to an upstream path
//! - Decide the method, headers and body sent upstream
//!
//! # Design Decisions
//! - Pure and total: the same request always yields the same decision and
//!   nothing here can fail
//! - Invalid JSON on the generic entry routes to chat-completions; this is
//!   deliberate, externally visible behavior
//! - Direct entry points are pass-through; their bodies are not inspected

use axum::http::{header, HeaderMap, HeaderName, Method};
use bytes::Bytes;

use crate::config::UpstreamConfig;
use crate::http::request::InboundRequest;
use crate::routing::entry::EntryPoint;
use crate::routing::matcher::{classify_body, BodyShape};

/// Hop-by-hop headers that describe the inbound connection, not the request.
static HOP_BY_HOP_HEADERS: [HeaderName; 7] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Non-standard hop-by-hop headers still sent by some clients.
const LEGACY_HOP_BY_HOP: &[&str] = &["keep-alive", "proxy-connection"];

/// Upstream route a request is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    ChatCompletions,
    Completions,
    Health,
}

impl RouteTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteTarget::ChatCompletions => "chat_completions",
            RouteTarget::Completions => "completions",
            RouteTarget::Health => "health",
        }
    }
}

/// Everything the upstream client needs to issue one call.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub target: RouteTarget,
    /// Upstream path, relative to the configured base URL.
    pub path: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Bytes,
}

/// Compiled routing table. Immutable after construction.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    chat_path: String,
    completions_path: String,
    health_path: String,
}

impl RequestRouter {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            chat_path: config.chat_completions_path.clone(),
            completions_path: config.completions_path.clone(),
            health_path: config.health_path.clone(),
        }
    }

    /// Pick the upstream route for an entry point and body.
    pub fn classify(entry: EntryPoint, body: &[u8]) -> RouteTarget {
        match entry {
            EntryPoint::Invoke => match classify_body(body) {
                BodyShape::Chat | BodyShape::Unparseable => RouteTarget::ChatCompletions,
                BodyShape::Prompt => RouteTarget::Completions,
            },
            EntryPoint::ChatCompletions => RouteTarget::ChatCompletions,
            EntryPoint::Completions => RouteTarget::Completions,
            EntryPoint::Health => RouteTarget::Health,
        }
    }

    /// Build the full decision for a captured request.
    pub fn decide(&self, request: &InboundRequest) -> RouteDecision {
        let target = Self::classify(request.entry(), request.body());
        let headers = forwardable_headers(request.headers());

        let (method, body) = match target {
            RouteTarget::Health => (Method::GET, Bytes::new()),
            _ => (request.method().clone(), request.body().clone()),
        };

        RouteDecision {
            target,
            path: self.path_for(target).to_string(),
            method,
            headers,
            query: request.query().map(str::to_owned),
            body,
        }
    }

    fn path_for(&self, target: RouteTarget) -> &str {
        match target {
            RouteTarget::ChatCompletions => &self.chat_path,
            RouteTarget::Completions => &self.completions_path,
            RouteTarget::Health => &self.health_path,
        }
    }
}

/// Copy inbound headers minus hop-by-hop ones and anything the inbound
/// `Connection` header lists.
pub fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = inbound
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        let lower = name.as_str();
        if HOP_BY_HOP_HEADERS.contains(name)
            || LEGACY_HOP_BY_HOP.contains(&lower)
            || listed.iter().any(|l| l == lower)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

//! Upstream failure classification.
//!
//! # Responsibilities
//! - Collapse transport errors into exactly one of three failure kinds
//! - Keep the target URL and underlying message for diagnostics
//!
//! # Design Decisions
//! - Raw hyper/io error types never leave this module
//! - A timed-out connect is a Timeout, not a ConnectError
//! - Anything that is neither a timeout nor a failed connect is a protocol
//!   error (malformed response, connection closed mid-message)

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The three ways an upstream exchange can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Timeout,
    ConnectError,
    ProtocolError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::ConnectError => "connect_error",
            FailureKind::ProtocolError => "protocol_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified upstream failure.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream {url} timed out after {after:?}: {detail}")]
    Timeout {
        url: String,
        after: Duration,
        detail: String,
    },

    #[error("failed to connect to upstream {url}: {detail}")]
    Connect { url: String, detail: String },

    #[error("protocol error talking to upstream {url}: {detail}")]
    Protocol { url: String, detail: String },
}

impl UpstreamError {
    pub fn timeout(url: impl Into<String>, after: Duration, detail: impl Into<String>) -> Self {
        UpstreamError::Timeout {
            url: url.into(),
            after,
            detail: detail.into(),
        }
    }

    pub fn connect(url: impl Into<String>, detail: impl Into<String>) -> Self {
        UpstreamError::Connect {
            url: url.into(),
            detail: detail.into(),
        }
    }

    pub fn protocol(url: impl Into<String>, detail: impl Into<String>) -> Self {
        UpstreamError::Protocol {
            url: url.into(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            UpstreamError::Timeout { .. } => FailureKind::Timeout,
            UpstreamError::Connect { .. } => FailureKind::ConnectError,
            UpstreamError::Protocol { .. } => FailureKind::ProtocolError,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            UpstreamError::Timeout { url, .. }
            | UpstreamError::Connect { url, .. }
            | UpstreamError::Protocol { url, .. } => url,
        }
    }

    /// Classify an error from the hyper-util client.
    ///
    /// `connect_timeout` is only used for the message when the connector
    /// gave up on a slow handshake.
    pub fn from_client(
        url: &str,
        err: &hyper_util::client::legacy::Error,
        connect_timeout: Duration,
    ) -> Self {
        let detail = describe(err);
        if is_timed_out(err) {
            UpstreamError::timeout(url, connect_timeout, detail)
        } else if err.is_connect() {
            UpstreamError::connect(url, detail)
        } else {
            UpstreamError::protocol(url, detail)
        }
    }

    /// Classify an error raised while reading the response body.
    pub fn from_body(url: &str, err: &(dyn StdError + 'static), stall: Duration) -> Self {
        let detail = describe(err);
        if is_timed_out(err) {
            UpstreamError::timeout(url, stall, detail)
        } else {
            UpstreamError::protocol(url, detail)
        }
    }
}

/// Walk the source chain looking for an io or hyper timeout.
fn is_timed_out(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return true;
            }
        }
        if e.downcast_ref::<hyper::Error>().is_some_and(hyper::Error::is_timeout) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Flatten the source chain into one line.
fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}

//! Logical entry points exposed by the gateway.

use std::fmt;

/// Which bound endpoint received a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    /// `POST /invocations`, routed by body shape.
    Invoke,
    /// `POST /v1/chat/completions`, passed through.
    ChatCompletions,
    /// `POST /v1/completions`, passed through.
    Completions,
    /// `GET /ping` and `GET /health`.
    Health,
}

impl EntryPoint {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Invoke => "invoke",
            EntryPoint::ChatCompletions => "chat_completions",
            EntryPoint::Completions => "completions",
            EntryPoint::Health => "health",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Body shape matching.
//!
//! # Responsibilities
//! - Decide whether a request body is a chat payload or a prompt payload
//! - Never fail: malformed bodies get their own shape
//!
//! # Design Decisions
//! - A body is a chat payload iff it is a JSON object with a `messages` key
//! - Any other valid JSON (object without `messages`, array, scalar) is a
//!   prompt payload
//! - Only top-level keys are inspected; values are never interpreted

use serde_json::Value;

/// The routing-relevant shape of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    /// JSON object carrying a `messages` key.
    Chat,
    /// Valid JSON without a `messages` key.
    Prompt,
    /// Not valid JSON (includes the empty body).
    Unparseable,
}

/// Classify a request body by shape.
pub fn classify_body(body: &[u8]) -> BodyShape {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) if map.contains_key("messages") => BodyShape::Chat,
        Ok(_) => BodyShape::Prompt,
        Err(_) => BodyShape::Unparseable,
    }
}

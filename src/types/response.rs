//! Response snapshot type.

use serde::{Deserialize, Serialize};

/// JSON pointer to the extracted completion inside a parsed value.
///
/// Matches the envelope produced by [`JsonParser`](crate::parser::JsonParser).
pub const COMPLETION_POINTER: &str = "/data/completion";

/// One snapshot of a model response.
///
/// During a streaming call `text` only ever grows; `parsed` is derived from
/// the whole current `text` each time and is `None` while the text is not
/// (yet) parseable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseState {
    /// Accumulated response text.
    pub text: String,

    /// Structured value parsed from `text`, if any.
    pub parsed: Option<serde_json::Value>,
}

impl ResponseState {
    /// Create a snapshot from text and its parse result.
    pub fn new(text: impl Into<String>, parsed: Option<serde_json::Value>) -> Self {
        Self {
            text: text.into(),
            parsed,
        }
    }

    /// The completion extracted from `parsed`, if present.
    pub fn completion(&self) -> Option<&serde_json::Value> {
        self.parsed.as_ref()?.pointer(COMPLETION_POINTER)
    }
}

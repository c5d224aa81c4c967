//! Prompt and conversation record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity logged for prompts that don't come from a named template file.
pub const UNKNOWN_PROMPT: &str = "Unknown";

/// Template variables, keyed by placeholder name.
pub type Variables = Map<String, Value>;

/// Output of a prompt generator: the rendered prompt text and the
/// variables it was rendered with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPrompt {
    pub template: String,
    pub variables: Variables,
}

impl RenderedPrompt {
    pub fn new(template: impl Into<String>, variables: Variables) -> Self {
        Self {
            template: template.into(),
            variables,
        }
    }
}

/// One recorded exchange, appended to the conversation log per
/// successful prompt generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub timestamp: DateTime<Utc>,
    /// Rendered prompt text sent to the model.
    pub template: String,
    pub variables: Variables,
    /// Raw response text.
    pub response: String,
    /// Structured completion, present only in structured-output mode.
    pub completion: Option<Value>,
    /// Template file name, or [`UNKNOWN_PROMPT`].
    pub prompt_identity: String,
}

impl ConversationMessage {
    /// Create a message stamped with the current time.
    pub fn new(
        prompt: RenderedPrompt,
        response: impl Into<String>,
        completion: Option<Value>,
        prompt_identity: Option<&str>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            template: prompt.template,
            variables: prompt.variables,
            response: response.into(),
            completion,
            prompt_identity: prompt_identity.unwrap_or(UNKNOWN_PROMPT).to_string(),
        }
    }
}

//! Promptify error types

use std::time::Duration;

/// Promptify error types
#[derive(Debug, thiserror::Error)]
pub enum PromptifyError {
    // Configuration errors
    #[error("ambiguous addressing: an endpoint excludes model and provider")]
    AmbiguousAddressing,

    #[error("incomplete addressing: either an endpoint or both model and provider are required")]
    IncompleteAddressing,

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Parameter is not declared as supported by the model adapter.
    ///
    /// Returned when validation policy is `Error` and a model config
    /// carries parameters the adapter doesn't accept.
    #[error("unsupported parameter '{param}' for model '{model}'")]
    UnsupportedParameter { param: String, model: String },

    // Prompt errors
    #[error("template error: {0}")]
    Template(String),

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    #[error("empty response from model")]
    EmptyResponse,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PromptifyError {
    /// Whether retrying the same request may succeed.
    ///
    /// Network failures, rate limits, server-side (5xx) API errors and
    /// broken streams are transient. Everything else is permanent and is
    /// returned to the caller without retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } | Self::Stream(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Provider-supplied retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether this error comes from model configuration and should halt
    /// startup rather than a single pipeline input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AmbiguousAddressing
                | Self::IncompleteAddressing
                | Self::Configuration(_)
                | Self::UnsupportedParameter { .. }
        )
    }
}

impl From<reqwest::Error> for PromptifyError {
    fn from(err: reqwest::Error) -> Self {
        match err.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => PromptifyError::AuthenticationFailed,
            Some(429) => PromptifyError::RateLimited { retry_after: None },
            Some(status) => PromptifyError::Api {
                status,
                message: err.to_string(),
            },
            None => PromptifyError::Http(err.to_string()),
        }
    }
}

/// Result type alias for Promptify operations
pub type Result<T> = std::result::Result<T, PromptifyError>;

//! Model adapters: validated configuration plus execution against a remote
//! completion endpoint.
//!
//! A [`Model`] declares its [`OutputMode`] up front. Callers branch on the
//! returned [`ModelOutput`] tag (or call [`ModelOutput::into_final()`])
//! instead of inspecting the shape of the result at runtime.

pub mod config;
pub mod unify;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stream::{FragmentStream, ResponseStream};
use crate::types::{ParameterName, ResponseState};
use crate::{PromptifyError, Result};

pub use config::{Addressing, ModelConfig, ModelConfigBuilder};
pub use unify::UnifyModel;

/// Whether an adapter streams snapshots or returns one final response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// A sequence of growing snapshots.
    #[default]
    Streaming,
    /// A single final response.
    SingleShot,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::SingleShot => "single_shot",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one model execution, tagged by output mode.
pub enum ModelOutput {
    Stream(ResponseStream<FragmentStream>),
    Single(ResponseState),
}

impl ModelOutput {
    pub fn mode(&self) -> OutputMode {
        match self {
            Self::Stream(_) => OutputMode::Streaming,
            Self::Single(_) => OutputMode::SingleShot,
        }
    }

    /// The final response, draining the stream if there is one.
    ///
    /// A stream that produced no text, or only whitespace, is an
    /// [`PromptifyError::EmptyResponse`].
    pub async fn into_final(self) -> Result<ResponseState> {
        match self {
            Self::Stream(stream) => stream
                .last()
                .await?
                .filter(|state| !state.text.is_empty())
                .ok_or(PromptifyError::EmptyResponse),
            Self::Single(state) => Ok(state),
        }
    }
}

impl fmt::Debug for ModelOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(_) => f.write_str("ModelOutput::Stream(..)"),
            Self::Single(state) => f.debug_tuple("ModelOutput::Single").field(state).finish(),
        }
    }
}

/// A remote model the pipeline can run prompts against.
#[async_trait]
pub trait Model: Send + Sync {
    /// Adapter name, e.g. `"Unify"`.
    fn name(&self) -> &str;

    fn config(&self) -> &ModelConfig;

    /// Generation parameters this adapter accepts.
    fn supported_parameters(&self) -> &'static [ParameterName];

    fn output_mode(&self) -> OutputMode {
        self.config().output_mode()
    }

    /// Run one prompt with retry on transient failures.
    async fn execute_with_retry(&self, prompt: &str) -> Result<ModelOutput>;

    /// Loggable snapshot of the model: its name plus [`ModelConfig::loggable()`].
    fn loggable(&self) -> BTreeMap<String, Value> {
        let mut out = self.config().loggable();
        out.insert("name".into(), Value::from(self.name()));
        out
    }

    /// Effective parameters for a call with `prompt`, API key excluded.
    fn parameters(&self, prompt: &str) -> Map<String, Value> {
        let config = self.config();
        let options = config.generate_options();
        let mut out = Map::new();
        out.insert("endpoint".into(), Value::from(options.model));
        if let Some(model) = config.addressing().model() {
            out.insert("model".into(), Value::from(model));
        }
        if let Some(provider) = config.addressing().provider() {
            out.insert("provider".into(), Value::from(provider));
        }
        if let Some(max_tokens) = options.max_tokens {
            out.insert("max_tokens".into(), Value::from(max_tokens));
        }
        out.insert(
            "stream".into(),
            Value::from(self.output_mode() == OutputMode::Streaming),
        );
        for (key, value) in options.extra {
            out.entry(key).or_insert(value);
        }
        out.insert("prompt".into(), Value::from(prompt));
        out
    }
}

//! Model configuration and addressing validation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::OutputMode;
use crate::parser::DEFAULT_JSON_DEPTH_LIMIT;
use crate::providers::RetryConfig;
use crate::types::{GenerateOptions, ParameterValidationPolicy};
use crate::{PromptifyError, Result};

/// Default maximum tokens per completion.
pub const DEFAULT_MAX_TOKENS: usize = 1000;

/// Default cap on the wait between retries.
pub const DEFAULT_API_WAIT: Duration = Duration::from_secs(60);

/// Default number of attempts per remote call.
pub const DEFAULT_API_RETRY: u32 = 6;

/// How the remote model is identified. Exactly one mode is ever set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// A fixed endpoint string, `model@provider`.
    Endpoint(String),
    /// A model served by a named provider.
    ModelProvider { model: String, provider: String },
}

impl Addressing {
    /// Resolve addressing from optional parts. Blank strings count as unset.
    ///
    /// Fails with [`PromptifyError::AmbiguousAddressing`] when an endpoint
    /// is combined with a model or provider, and with
    /// [`PromptifyError::IncompleteAddressing`] when neither an endpoint nor
    /// both model and provider are given.
    pub fn resolve(
        endpoint: Option<String>,
        model: Option<String>,
        provider: Option<String>,
    ) -> Result<Self> {
        let present = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        match (present(endpoint), present(model), present(provider)) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(PromptifyError::AmbiguousAddressing)
            }
            (Some(endpoint), None, None) => Ok(Self::Endpoint(endpoint)),
            (None, Some(model), Some(provider)) => Ok(Self::ModelProvider { model, provider }),
            _ => Err(PromptifyError::IncompleteAddressing),
        }
    }

    /// The identifier sent to the router.
    pub fn endpoint_id(&self) -> String {
        match self {
            Self::Endpoint(endpoint) => endpoint.clone(),
            Self::ModelProvider { model, provider } => format!("{model}@{provider}"),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Endpoint(endpoint) => Some(endpoint),
            Self::ModelProvider { .. } => None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            Self::ModelProvider { model, .. } => Some(model),
            Self::Endpoint(_) => None,
        }
    }

    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::ModelProvider { provider, .. } => Some(provider),
            Self::Endpoint(_) => None,
        }
    }
}

/// Validated configuration for a remote model.
///
/// Built through [`ModelConfig::builder()`]; construction fails fast on
/// invalid addressing and is never repaired silently.
///
/// ```rust
/// # use promptify::ModelConfig;
/// let config = ModelConfig::builder("unify-key")
///     .model("llama-3-8b-chat")
///     .provider("fireworks-ai")
///     .build()?;
/// assert_eq!(config.addressing().endpoint_id(), "llama-3-8b-chat@fireworks-ai");
/// # Ok::<(), promptify::PromptifyError>(())
/// ```
#[derive(Clone, PartialEq)]
pub struct ModelConfig {
    api_key: String,
    addressing: Addressing,
    max_tokens: usize,
    api_wait: Duration,
    api_retry: u32,
    json_depth_limit: usize,
    output_mode: OutputMode,
    validation_policy: ParameterValidationPolicy,
    extra: Map<String, Value>,
}

impl ModelConfig {
    /// Start building a config with the given API key.
    pub fn builder(api_key: impl Into<String>) -> ModelConfigBuilder {
        ModelConfigBuilder::new(api_key)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn addressing(&self) -> &Addressing {
        &self.addressing
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn api_wait(&self) -> Duration {
        self.api_wait
    }

    pub fn api_retry(&self) -> u32 {
        self.api_retry
    }

    pub fn json_depth_limit(&self) -> usize {
        self.json_depth_limit
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn validation_policy(&self) -> ParameterValidationPolicy {
        self.validation_policy
    }

    /// Additional generation parameters passed through to the endpoint.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Replace the API key.
    pub fn set_key(&mut self, api_key: impl Into<String>) -> Result<()> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(PromptifyError::Configuration("api key is required".into()));
        }
        self.api_key = api_key;
        Ok(())
    }

    /// Re-target a model/provider-addressed config.
    ///
    /// An endpoint-addressed config can't take a model and provider, so
    /// this fails with [`PromptifyError::AmbiguousAddressing`] for it.
    pub fn set_model(&mut self, model: impl Into<String>, provider: impl Into<String>) -> Result<()> {
        if self.addressing.endpoint().is_some() {
            return Err(PromptifyError::AmbiguousAddressing);
        }
        self.addressing = Addressing::resolve(None, Some(model.into()), Some(provider.into()))?;
        Ok(())
    }

    /// Request options derived from this config.
    pub fn generate_options(&self) -> GenerateOptions {
        let mut options =
            GenerateOptions::new(self.addressing.endpoint_id()).max_tokens(self.max_tokens);
        options.extra = self.extra.clone();
        options
    }

    /// Retry settings for remote calls.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::from_api_settings(self.api_wait, self.api_retry)
    }

    /// Key/value projection safe to write to conversation logs.
    ///
    /// Only string and numeric settings are included and the API key never
    /// is. In endpoint mode `model` holds the endpoint string.
    pub fn loggable(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        match &self.addressing {
            Addressing::Endpoint(endpoint) => {
                out.insert("model".into(), Value::from(endpoint.as_str()));
                out.insert("endpoint".into(), Value::from(endpoint.as_str()));
            }
            Addressing::ModelProvider { model, provider } => {
                out.insert("model".into(), Value::from(model.as_str()));
                out.insert("provider".into(), Value::from(provider.as_str()));
            }
        }
        out.insert("max_tokens".into(), Value::from(self.max_tokens));
        out.insert("api_wait".into(), Value::from(self.api_wait.as_secs()));
        out.insert("api_retry".into(), Value::from(self.api_retry));
        out.insert("json_depth_limit".into(), Value::from(self.json_depth_limit));
        out.insert("output_mode".into(), Value::from(self.output_mode.as_str()));
        for (key, value) in &self.extra {
            if value.is_string() || value.is_number() {
                out.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        out
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"<redacted>")
            .field("addressing", &self.addressing)
            .field("max_tokens", &self.max_tokens)
            .field("api_wait", &self.api_wait)
            .field("api_retry", &self.api_retry)
            .field("json_depth_limit", &self.json_depth_limit)
            .field("output_mode", &self.output_mode)
            .field("validation_policy", &self.validation_policy)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Builder for [`ModelConfig`].
#[derive(Debug, Clone)]
pub struct ModelConfigBuilder {
    api_key: String,
    endpoint: Option<String>,
    model: Option<String>,
    provider: Option<String>,
    max_tokens: usize,
    api_wait: Duration,
    api_retry: u32,
    json_depth_limit: usize,
    output_mode: OutputMode,
    validation_policy: ParameterValidationPolicy,
    extra: Map<String, Value>,
}

impl ModelConfigBuilder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: None,
            model: None,
            provider: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_wait: DEFAULT_API_WAIT,
            api_retry: DEFAULT_API_RETRY,
            json_depth_limit: DEFAULT_JSON_DEPTH_LIMIT,
            output_mode: OutputMode::default(),
            validation_policy: ParameterValidationPolicy::default(),
            extra: Map::new(),
        }
    }

    /// Address the model by a fixed endpoint string (`model@provider`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Cap on the wait between retries.
    pub fn api_wait(mut self, wait: Duration) -> Self {
        self.api_wait = wait;
        self
    }

    /// Maximum attempts per remote call.
    pub fn api_retry(mut self, attempts: u32) -> Self {
        self.api_retry = attempts;
        self
    }

    pub fn json_depth_limit(mut self, limit: usize) -> Self {
        self.json_depth_limit = limit;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn validation_policy(mut self, policy: ParameterValidationPolicy) -> Self {
        self.validation_policy = policy;
        self
    }

    /// Add a generation parameter passed through to the endpoint.
    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<ModelConfig> {
        let addressing = Addressing::resolve(self.endpoint, self.model, self.provider)?;
        if self.api_key.trim().is_empty() {
            return Err(PromptifyError::Configuration("api key is required".into()));
        }
        if self.json_depth_limit == 0 {
            return Err(PromptifyError::Configuration(
                "json_depth_limit must be at least 1".into(),
            ));
        }

        Ok(ModelConfig {
            api_key: self.api_key,
            addressing,
            max_tokens: self.max_tokens,
            api_wait: self.api_wait,
            api_retry: self.api_retry,
            json_depth_limit: self.json_depth_limit,
            output_mode: self.output_mode,
            validation_policy: self.validation_policy,
            extra: self.extra,
        })
    }
}

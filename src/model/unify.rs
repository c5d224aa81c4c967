//! Model adapter for the Unify router.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use tracing::{debug, instrument, warn};

use super::{Model, ModelConfig, ModelOutput, OutputMode};
use crate::parser::{JsonParser, OutputParser};
use crate::providers::unify::DEFAULT_BASE_URL;
use crate::providers::{CompletionClient, RetryingClient, UnifyClient};
use crate::stream::{FragmentStream, ResponseStream};
use crate::types::{ParameterName, ParameterValidationPolicy, ResponseState};
use crate::{PromptifyError, Result};

const SUPPORTED_PARAMETERS: &[ParameterName] = &[
    ParameterName::MaxTokens,
    ParameterName::Temperature,
    ParameterName::TopP,
    ParameterName::Stop,
    ParameterName::Seed,
    ParameterName::FrequencyPenalty,
    ParameterName::PresencePenalty,
];

/// Model served through the Unify router.
///
/// Owns its [`ModelConfig`], a completion client, and the output parser used
/// to derive structured values from response text.
pub struct UnifyModel {
    config: ModelConfig,
    client: Arc<dyn CompletionClient>,
    retrying: RetryingClient,
    parser: Arc<dyn OutputParser>,
    // Set when the client was built here, so key changes can rebuild it.
    base_url: Option<String>,
}

impl UnifyModel {
    pub const NAME: &'static str = "Unify";

    /// Create a model talking to the public Unify endpoint.
    pub fn new(config: ModelConfig) -> Result<Self> {
        Self::with_base_url(config, DEFAULT_BASE_URL)
    }

    /// Create a model talking to a custom base URL.
    pub fn with_base_url(config: ModelConfig, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let client = UnifyClient::with_base_url(config.api_key(), base_url.clone())?;
        let mut model = Self::with_client(config, Arc::new(client))?;
        model.base_url = Some(base_url);
        Ok(model)
    }

    /// Create a model over an arbitrary completion client.
    ///
    /// Checks the config's extra parameters against the supported list,
    /// following the config's validation policy.
    pub fn with_client(config: ModelConfig, client: Arc<dyn CompletionClient>) -> Result<Self> {
        validate_parameters(&config)?;
        let retrying = RetryingClient::new(client.clone(), config.retry_config());
        Ok(Self {
            config,
            client,
            retrying,
            parser: Arc::new(JsonParser::new()),
            base_url: None,
        })
    }

    /// Replace the output parser.
    pub fn with_parser(mut self, parser: Arc<dyn OutputParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Run a prompt once, without retry.
    ///
    /// In single-shot mode the stream holds exactly one fragment.
    #[instrument(skip_all, fields(endpoint = %self.config.addressing().endpoint_id()))]
    pub async fn run(&self, prompt: &str) -> Result<ResponseStream<FragmentStream>> {
        let options = self.config.generate_options();
        let fragments: FragmentStream = match self.config.output_mode() {
            OutputMode::Streaming => self.client.generate_stream(prompt, &options).await?,
            OutputMode::SingleShot => {
                let text = self.client.generate(prompt, &options).await?;
                Box::pin(stream::once(async move { Ok(text) }))
            }
        };
        Ok(self.response_stream(fragments))
    }

    /// Replace the API key.
    ///
    /// When the client was built by this model it is rebuilt with the new
    /// key; an injected client is kept as is.
    pub fn set_key(&mut self, api_key: impl Into<String>) -> Result<()> {
        let mut config = self.config.clone();
        config.set_key(api_key)?;
        if let Some(base_url) = &self.base_url {
            let client: Arc<dyn CompletionClient> =
                Arc::new(UnifyClient::with_base_url(config.api_key(), base_url.clone())?);
            self.retrying = RetryingClient::new(client.clone(), config.retry_config());
            self.client = client;
        }
        self.config = config;
        Ok(())
    }

    /// Re-target the model. Fails for endpoint-addressed models.
    pub fn set_model(&mut self, model: impl Into<String>, provider: impl Into<String>) -> Result<()> {
        self.config.set_model(model, provider)?;
        debug!(endpoint = %self.config.addressing().endpoint_id(), "model retargeted");
        Ok(())
    }

    fn response_stream(&self, fragments: FragmentStream) -> ResponseStream<FragmentStream> {
        ResponseStream::new(fragments, self.parser.clone(), self.config.json_depth_limit())
    }
}

fn validate_parameters(config: &ModelConfig) -> Result<()> {
    let requested = config.generate_options().set_parameters();
    let unsupported: Vec<_> = requested
        .iter()
        .filter(|p| !SUPPORTED_PARAMETERS.contains(p))
        .collect();
    if unsupported.is_empty() {
        return Ok(());
    }

    let endpoint = config.addressing().endpoint_id();
    match config.validation_policy() {
        ParameterValidationPolicy::Ignore => Ok(()),
        ParameterValidationPolicy::Warn => {
            for param in &unsupported {
                warn!(param = %param, model = %endpoint, "unsupported parameter");
            }
            Ok(())
        }
        ParameterValidationPolicy::Error => Err(PromptifyError::UnsupportedParameter {
            param: unsupported[0].to_string(),
            model: endpoint,
        }),
    }
}

#[async_trait]
impl Model for UnifyModel {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn supported_parameters(&self) -> &'static [ParameterName] {
        SUPPORTED_PARAMETERS
    }

    #[instrument(skip_all, fields(endpoint = %self.config.addressing().endpoint_id()))]
    async fn execute_with_retry(&self, prompt: &str) -> Result<ModelOutput> {
        let options = self.config.generate_options();
        match self.config.output_mode() {
            OutputMode::Streaming => {
                let fragments = self.retrying.generate_stream(prompt, &options).await?;
                Ok(ModelOutput::Stream(self.response_stream(fragments)))
            }
            OutputMode::SingleShot => {
                let text = self.retrying.generate(prompt, &options).await?;
                let text = text.trim_end();
                if text.is_empty() {
                    return Err(PromptifyError::EmptyResponse);
                }
                let parsed = self.parser.fit(text, self.config.json_depth_limit());
                Ok(ModelOutput::Single(ResponseState::new(text, parsed)))
            }
        }
    }
}

impl std::fmt::Debug for UnifyModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifyModel")
            .field("config", &self.config)
            .field("client", &self.client.name())
            .finish_non_exhaustive()
    }
}

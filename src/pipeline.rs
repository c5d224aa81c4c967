//! Pipeline: prompt generators run against one model, with response caching
//! and conversation logging.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::Result;
use crate::cache::{DEFAULT_CACHE_SIZE, PromptCache};
use crate::logger::ConversationLogger;
use crate::model::Model;
use crate::prompt::PromptGenerator;
use crate::types::{ConversationMessage, ResponseState, Variables};

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Record the parsed completion alongside each logged response.
    pub structured_output: bool,
    /// Reuse responses for identical rendered prompts.
    pub cache_prompt: bool,
    /// Maximum number of cached responses.
    pub cache_size: u64,
    /// Directory under which `conversations/` is created.
    pub output_path: PathBuf,
    /// Log each rendered prompt at info level.
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            structured_output: true,
            cache_prompt: true,
            cache_size: DEFAULT_CACHE_SIZE,
            output_path: PathBuf::from("."),
            verbose: false,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn structured_output(mut self, enabled: bool) -> Self {
        self.structured_output = enabled;
        self
    }

    pub fn cache_prompt(mut self, enabled: bool) -> Self {
        self.cache_prompt = enabled;
        self
    }

    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Runs each input through every prompt generator, in order.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use promptify::{ModelConfig, Pipeline, PipelineConfig, PromptGenerator, TemplatePrompter, UnifyModel, Variables};
/// # async fn example() -> promptify::Result<()> {
/// let model = UnifyModel::new(
///     ModelConfig::builder("unify-key").endpoint("llama-3-8b-chat@fireworks-ai").build()?,
/// )?;
/// let ner: Arc<dyn PromptGenerator> = Arc::new(TemplatePrompter::from_file("ner.jinja")?);
/// let pipeline = Pipeline::new(vec![ner], Arc::new(model), PipelineConfig::default())?;
///
/// if let Some(responses) = pipeline.fit("The patient has a fever.", &Variables::new()).await {
///     println!("{:?}", responses[0].completion());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    prompters: Vec<Arc<dyn PromptGenerator>>,
    model: Arc<dyn Model>,
    config: PipelineConfig,
    cache: Option<PromptCache>,
    logger: ConversationLogger,
}

impl Pipeline {
    /// Build a pipeline and open its conversation log.
    pub fn new(
        prompters: Vec<Arc<dyn PromptGenerator>>,
        model: Arc<dyn Model>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let cache = config
            .cache_prompt
            .then(|| PromptCache::new(config.cache_size));
        let logger = ConversationLogger::new(&config.output_path, model.loggable())?;
        Ok(Self {
            prompters,
            model,
            config,
            cache,
            logger,
        })
    }

    /// Run one input, returning one response per generator.
    ///
    /// Returns `None` when any generator fails; the error is logged and the
    /// outputs already produced for this input are discarded.
    pub async fn fit(&self, input: &str, variables: &Variables) -> Option<Vec<ResponseState>> {
        match self.try_fit(input, variables).await {
            Ok(outputs) => Some(outputs),
            Err(e) => {
                error!(error = %e, "pipeline input failed");
                None
            }
        }
    }

    /// Like [`fit()`](Self::fit) but returns the first error.
    #[instrument(skip_all, fields(generators = self.prompters.len()))]
    pub async fn try_fit(&self, input: &str, variables: &Variables) -> Result<Vec<ResponseState>> {
        let mut outputs = Vec::with_capacity(self.prompters.len());

        for prompter in &self.prompters {
            let prompt = prompter.generate(input, self.model.config(), variables)?;
            if self.config.verbose {
                info!(
                    prompt = %prompt.template,
                    parameters = ?self.model.parameters(&prompt.template),
                    "rendered prompt"
                );
            }

            let response = self.respond(&prompt.template).await?;
            let completion = if self.config.structured_output {
                response.completion().cloned()
            } else {
                None
            };
            let message = ConversationMessage::new(
                prompt,
                response.text.clone(),
                completion,
                prompter.identity(),
            );
            self.logger.add_message(&message)?;
            outputs.push(response);
        }

        Ok(outputs)
    }

    /// Run every input. A failed input yields `None` and the batch goes on.
    pub async fn fit_batch<I>(&self, inputs: &[I], variables: &Variables) -> Vec<Option<Vec<ResponseState>>>
    where
        I: AsRef<str>,
    {
        let mut results = Vec::with_capacity(inputs.len());
        for input in inputs {
            results.push(self.fit(input.as_ref(), variables).await);
        }
        results
    }

    async fn respond(&self, prompt: &str) -> Result<ResponseState> {
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(prompt)
        {
            return Ok(hit);
        }

        let response = self
            .model
            .execute_with_retry(prompt)
            .await?
            .into_final()
            .await?;

        if let Some(cache) = &self.cache {
            cache.put(prompt, response.clone());
        }
        Ok(response)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// The response cache, when caching is enabled.
    pub fn cache(&self) -> Option<&PromptCache> {
        self.cache.as_ref()
    }

    pub fn logger(&self) -> &ConversationLogger {
        &self.logger
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("generators", &self.prompters.len())
            .field("model", &self.model.name())
            .field("config", &self.config)
            .field("session", &self.logger.session_id())
            .finish()
    }
}

//! Promptify - prompt pipelines over the Unify LLM router
//!
//! Renders prompt templates, sends them to a remote model, parses the
//! (possibly still streaming) response into structured JSON, caches
//! responses by prompt, and logs every exchange.
//!
//! # Pipeline Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use promptify::{
//!     ModelConfig, Pipeline, PipelineConfig, PromptGenerator, TemplatePrompter, UnifyModel, Variables,
//! };
//!
//! #[tokio::main]
//! async fn main() -> promptify::Result<()> {
//!     let model = UnifyModel::new(
//!         ModelConfig::builder("unify-key")
//!             .model("llama-3-8b-chat")
//!             .provider("fireworks-ai")
//!             .build()?,
//!     )?;
//!
//!     let ner: Arc<dyn PromptGenerator> =
//!         Arc::new(TemplatePrompter::new("List the symptoms in JSON: {{ text_input }}"));
//!     let pipeline = Pipeline::new(vec![ner], Arc::new(model), PipelineConfig::default())?;
//!
//!     let responses = pipeline.try_fit("The patient has a fever.", &Variables::new()).await?;
//!     println!("{:?}", responses[0].completion());
//!     Ok(())
//! }
//! ```
//!
//! # Streaming Example
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use promptify::{ModelConfig, UnifyModel};
//!
//! #[tokio::main]
//! async fn main() -> promptify::Result<()> {
//!     let model = UnifyModel::new(ModelConfig::builder("unify-key").endpoint("gpt-4o@openai").build()?)?;
//!
//!     let mut stream = model.run("Give me three colours as a JSON list").await?;
//!     while let Some(state) = stream.next().await {
//!         let state = state?;
//!         println!("{} -> {:?}", state.text, state.parsed);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod providers;
pub mod stream;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use cache::PromptCache;
pub use error::{PromptifyError, Result};
pub use logger::ConversationLogger;
pub use model::{Addressing, Model, ModelConfig, ModelOutput, OutputMode, UnifyModel};
pub use parser::{JsonParser, OutputParser};
pub use pipeline::{Pipeline, PipelineConfig};
pub use prompt::{PromptGenerator, TemplatePrompter};
pub use providers::{CompletionClient, RetryConfig, RetryingClient, UnifyClient};
pub use stream::{FragmentStream, ResponseStream};
pub use types::{
    ConversationMessage, GenerateOptions, ParameterName, ParameterValidationPolicy,
    RenderedPrompt, ResponseState, Variables,
};
pub use version::{PKG_VERSION, version_string};

//! Caching subsystem.
//!
//! [`PromptCache`] stores the final response per rendered prompt. It sits in
//! [`Pipeline`](crate::Pipeline) in front of the model adapter: a hit
//! bypasses the remote call, the retry wrapper and request metrics. Disable
//! it per pipeline with [`PipelineConfig::cache_prompt`](crate::PipelineConfig::cache_prompt).

pub mod response;

pub use response::{DEFAULT_CACHE_SIZE, PromptCache};

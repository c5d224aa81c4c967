//! Remote completion client trait.
//!
//! The model adapter talks to the remote endpoint only through
//! [`CompletionClient`], so decorators (retry) and test doubles slot in
//! without touching the adapter.

use async_trait::async_trait;

use crate::Result;
use crate::stream::FragmentStream;
use crate::types::GenerateOptions;

/// A remote text-completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Client name for logging/metrics.
    fn name(&self) -> &str;

    /// Single-shot completion: the whole response text at once.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;

    /// Streaming completion: a stream of text fragments.
    ///
    /// Errors establishing the stream are returned here; errors after the
    /// stream is established arrive as stream items. Backends without
    /// streaming may return a single-item stream.
    async fn generate_stream(&self, prompt: &str, options: &GenerateOptions)
    -> Result<FragmentStream>;
}

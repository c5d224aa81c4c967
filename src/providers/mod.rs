//! Remote completion clients.
//!
//! - [`CompletionClient`]: the trait the model adapter calls through.
//! - [`UnifyClient`]: HTTP client for the Unify router (SSE streaming and
//!   single-shot).
//! - [`RetryingClient`]: decorator adding retry with backoff on transient
//!   errors.
//! - [`backpressure`]: bounded-channel wrapper applied to streamed output.

pub mod backpressure;
pub mod retry;
pub mod traits;
pub mod unify;

pub use retry::{RetryConfig, RetryingClient};
pub use traits::CompletionClient;
pub use unify::UnifyClient;

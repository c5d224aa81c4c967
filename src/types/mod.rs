//! Public types for the Promptify API.

mod generate;
mod message;
mod parameter;
mod response;

pub use generate::GenerateOptions;
pub use message::{ConversationMessage, RenderedPrompt, UNKNOWN_PROMPT, Variables};
pub use parameter::{ParameterName, ParameterValidationPolicy};
pub use response::{COMPLETION_POINTER, ResponseState};

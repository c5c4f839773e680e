//! Assistant provider adapters.
//!
//! - `OpenAIProvider` - any OpenAI-compatible chat completions endpoint
//! - `MockAssistantProvider` - deterministic replies for tests and local runs

mod mock_provider;
mod openai_provider;

pub use mock_provider::{MockAssistantProvider, MOCK_MODEL};
pub use openai_provider::{OpenAIConfig, OpenAIProvider};

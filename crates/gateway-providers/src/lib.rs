//! Upstream LLM provider bindings and the registry that resolves a model
//! identifier to one (design §4.5, component C5).

pub mod anthropic;
pub mod client;
pub mod openai;
pub mod registry;

pub use anthropic::AnthropicClient;
pub use client::{classify_status, estimate_tokens, ProviderClient, ProviderCompletion};
pub use openai::OpenAiClient;
pub use registry::{ModelInfo, ProviderBinding, ProviderRegistry};

//! Language-model access for request classification.

pub mod client;
pub mod config;
pub mod openai;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{build_llm_client, LlmConfig};
pub use openai::OpenAiCompatibleClient;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use ticketing_common::{Result, TicketingError};

use crate::client::LlmClient;
use crate::openai::OpenAiCompatibleClient;

/// Environment variables consulted for the API key, in order.
const API_KEY_VARS: &[&str] = &["LLM_API_KEY", "GEMINI_API_KEY", "OPENAI_API_KEY"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Only "openai" (any OpenAI-compatible endpoint) is supported
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Overlay `LLM_MODEL`, `LLM_API_URL` and the API key variables.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(model) = lookup("LLM_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model = model;
        }
        if let Some(url) = lookup("LLM_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_url = Some(url);
        }
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            self.api_key = API_KEY_VARS
                .iter()
                .find_map(|var| lookup(var).filter(|v| !v.is_empty()));
        }
    }
}

pub fn build_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiCompatibleClient::new(
            config.api_url.clone(),
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        other => Err(TicketingError::Config(format!(
            "Unknown LLM provider: {other}"
        ))),
    }
}

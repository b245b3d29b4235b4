//! Language-model classifier.
//!
//! # Output validation
//!
//! The model's reply is untrusted:
//! - the intent label is checked against a whitelist
//! - confidence is clamped to [0.0, 1.0]
//! - reasoning is truncated
//! - extracted fields are type-checked one by one

use super::{Classifier, DEFAULT_MIN_CONFIDENCE};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use ticketing_common::security::validate_request_text;
use ticketing_common::{Classification, Intent, IntentKind, RequestFields, Result, TicketingError};
use ticketing_llm::{LlmClient, LlmRequest};
use tracing::{debug, info, warn};

/// Labels the model may answer with.
const VALID_INTENTS: &[&str] = &["create", "search", "update", "unknown"];

const MAX_REASONING_LENGTH: usize = 500;

/// Maximum length for any single extracted text field.
const MAX_FIELD_LENGTH: usize = 2048;

const DEFAULT_TEMPERATURE: f32 = 0.0;
const DEFAULT_MAX_TOKENS: u32 = 512;

/// Classifier that asks a language model for a JSON verdict.
pub struct LlmClassifier {
    client: Arc<dyn LlmClient>,
    prompt: String,
    min_confidence: f32,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClassifier {
    pub fn new(client: Arc<dyn LlmClient>, prompt: impl Into<String>) -> Self {
        Self {
            client,
            prompt: prompt.into(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Override the sampling settings sent with each request; `None` keeps
    /// the deterministic defaults.
    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        if let Some(temperature) = temperature {
            self.temperature = temperature.max(0.0);
        }
        if let Some(max_tokens) = max_tokens {
            self.max_tokens = max_tokens.max(1);
        }
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    /// Turn the model's reply into a classification.
    fn parse_response(&self, response: &str) -> Result<Classification> {
        let json_str = extract_json_object(response).ok_or_else(|| {
            TicketingError::Llm(format!(
                "No valid JSON found in response: {}",
                response.chars().take(200).collect::<String>()
            ))
        })?;

        let parsed: Value = serde_json::from_str(json_str)
            .map_err(|e| TicketingError::Llm(format!("Invalid JSON: {e}")))?;

        let label = parsed
            .get("intent")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "unknown".into());
        let kind = if VALID_INTENTS.contains(&label.as_str()) {
            label.parse::<IntentKind>().unwrap_or(IntentKind::Unknown)
        } else {
            warn!(invalid_intent = %label, "Invalid intent in LLM response, using unknown");
            IntentKind::Unknown
        };

        let confidence = parsed
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.5) as f32;

        let reasoning = parsed
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or("No reasoning provided");
        let reasoning = if reasoning.len() > MAX_REASONING_LENGTH {
            reasoning.chars().take(MAX_REASONING_LENGTH).collect::<String>() + "..."
        } else {
            reasoning.to_string()
        };

        let intent = match kind {
            IntentKind::Unknown => Intent::Unknown {
                reason: reasoning.clone(),
            },
            kind => Intent::from_fields(kind, &fields_from_json(&parsed)),
        };

        Ok(Classification {
            intent,
            confidence,
            reasoning,
        })
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        validate_request_text(text)?;
        debug!(
            model = self.client.model_name(),
            content_preview = %text.chars().take(50).collect::<String>(),
            "LLM classification"
        );

        let request = LlmRequest::single_turn(self.prompt.clone(), text)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let response = self.client.complete(request).await?;
        debug!(response = %response.content, "LLM classifier response");

        let classification = self.parse_response(&response.content)?;
        info!(
            intent = %classification.kind(),
            confidence = classification.confidence,
            "LLM classification decision"
        );
        Ok(classification.apply_threshold(self.min_confidence))
    }
}

fn text_field(value: &Value, key: &str) -> Option<String> {
    let text = value.get(key)?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_FIELD_LENGTH).collect())
}

/// Ticket ids arrive as numbers or as strings like "#42".
fn ticket_id_field(value: &Value) -> Option<u64> {
    match value.get("ticket_id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    }
}

fn fields_from_json(value: &Value) -> RequestFields {
    RequestFields {
        ticket_id: ticket_id_field(value),
        subject: text_field(value, "subject"),
        body: text_field(value, "body"),
        requester: text_field(value, "requester"),
        state: text_field(value, "state"),
        priority: text_field(value, "priority"),
        query: text_field(value, "query"),
        message: text_field(value, "message"),
    }
}

/// Extract the first balanced JSON object from a string that may contain
/// other text. Braces inside string literals are ignored.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

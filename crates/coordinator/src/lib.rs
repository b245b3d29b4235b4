//! Request orchestration for the ticketing assistant.
//!
//! The coordinator is the central brain that:
//! 1. Receives user requests
//! 2. Classifies them into a ticket intent
//! 3. Dispatches the intent to the matching subagent
//! 4. Runs multi-step YAML orchestration definitions
//!
//! # Architecture
//!
//! ```text
//! User Request / YAML step
//!      │
//!      ▼
//! ┌─────────────────┐
//! │  Orchestrator   │  ◄── Classifier (keyword | llm)
//! │   (this crate)  │
//! └────────┬────────┘
//!          │ Intent
//!    ┌─────┴─────┬──────────┐
//!    ▼           ▼          ▼
//! [Create]   [Search]   [Update]
//!    └───────────┴──────────┴──► TicketBackend (Zammad)
//! ```

pub mod config;
pub mod definition;
pub mod orchestrator;
pub mod routing;
pub mod runner;

pub use config::AppConfig;
pub use definition::{OrchestrationDefinition, StepDefinition, StepInput, TicketRef};
pub use orchestrator::{Orchestrator, OrchestratorState, Response};
pub use routing::SubagentRegistry;
pub use runner::{DefinitionRunner, RunReport, StepReport};

use std::sync::Arc;
use ticketing_agents::{Classifier, ClassifierStrategy, KeywordClassifier, LlmClassifier, PromptLibrary};
use ticketing_common::Result;
use ticketing_llm::{build_llm_client, LlmClient};
use tracing::info;

/// Build the classifier selected by `config`.
pub fn build_classifier(config: &AppConfig) -> Result<Arc<dyn Classifier>> {
    let min_confidence = config.classifier.min_confidence;
    let classifier: Arc<dyn Classifier> = match config.classifier.strategy {
        ClassifierStrategy::Keyword => Arc::new(KeywordClassifier::new(min_confidence)),
        ClassifierStrategy::Llm => {
            let prompt = PromptLibrary::new(&config.prompts_dir).classifier_prompt()?;
            let client = build_llm_client(&config.llm)?;
            Arc::new(llm_classifier(config, client, prompt))
        }
    };
    info!(
        strategy = %config.classifier.strategy,
        min_confidence,
        "Classifier ready"
    );
    Ok(classifier)
}

fn llm_classifier(config: &AppConfig, client: Arc<dyn LlmClient>, prompt: String) -> LlmClassifier {
    LlmClassifier::new(client, prompt)
        .with_min_confidence(config.classifier.min_confidence)
        .with_sampling(config.llm.temperature, config.llm.max_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use ticketing_llm::{LlmRequest, LlmResponse};

    #[derive(Default)]
    struct RecordingLlm {
        requests: Mutex<Vec<LlmRequest>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(LlmResponse {
                content: r#"{"intent":"unknown","confidence":0.9}"#.into(),
                model: "recording".into(),
                usage: None,
                finish_reason: None,
            })
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn llm_settings_from_config_are_sent() {
        let config: AppConfig = toml::from_str(
            r#"
[llm]
temperature = 0.3
max_tokens = 256
"#,
        )
        .unwrap();
        let client = Arc::new(RecordingLlm::default());
        let classifier = llm_classifier(&config, client.clone(), "classify".into());
        classifier.classify("hello").await.unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].max_tokens, Some(256));
    }

    #[test]
    fn keyword_strategy_is_default() {
        let classifier = build_classifier(&AppConfig::default()).unwrap();
        assert_eq!(classifier.name(), "keyword");
    }
}

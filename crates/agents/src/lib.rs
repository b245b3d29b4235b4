//! Ticketing subagents.
//!
//! - **Classification**: maps free text to an intent (keyword or LLM strategy)
//! - **Creation**: opens a ticket
//! - **Search**: looks up one ticket or searches many
//! - **Update**: changes state, priority or subject and posts messages
//!
//! ```text
//!                  ┌──────────────┐
//!   free text ───► │  Classifier  │ ──► Intent
//!                  └──────────────┘
//!                                        │
//!          ┌─────────────────────────────┼─────────────────────────┐
//!          ▼                             ▼                         ▼
//!   ┌─────────────┐              ┌─────────────┐           ┌─────────────┐
//!   │  Creation   │              │   Search    │           │   Update    │
//!   └──────┬──────┘              └──────┬──────┘           └──────┬──────┘
//!          └────────────────────► TicketBackend ◄──────────────────┘
//! ```

pub mod classifier;
pub mod creation;
pub mod prompts;
pub mod search;
pub mod update;

pub use classifier::{
    Classifier, ClassifierStrategy, KeywordClassifier, LlmClassifier, DEFAULT_MIN_CONFIDENCE,
};
pub use creation::CreationAgent;
pub use prompts::PromptLibrary;
pub use search::SearchAgent;
pub use update::UpdateAgent;

use std::sync::Arc;
use ticketing_common::{Intent, Subagent, TicketingError};
use ticketing_zammad::TicketBackend;

/// The three action subagents, sharing one backend.
pub fn action_agents(backend: Arc<dyn TicketBackend>) -> Vec<Arc<dyn Subagent>> {
    vec![
        Arc::new(CreationAgent::new(backend.clone())),
        Arc::new(SearchAgent::new(backend.clone())),
        Arc::new(UpdateAgent::new(backend)),
    ]
}

pub(crate) fn mismatched_intent(agent: &str, intent: &Intent) -> TicketingError {
    TicketingError::Validation(format!(
        "the {agent} agent cannot handle a '{}' intent",
        intent.kind()
    ))
}

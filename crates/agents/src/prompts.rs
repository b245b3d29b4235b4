//! Prompt files for model-backed subagents.
//!
//! Prompts live as `<agent_name>.prompt` files in a prompts directory. A
//! missing file falls back to the built-in text so the binary works without
//! any prompt files deployed.

use std::path::{Path, PathBuf};
use ticketing_common::{Result, TicketingError};
use tracing::{debug, warn};

/// File stem of the classifier prompt.
pub const CLASSIFIER_PROMPT_NAME: &str = "ticket_classifier_agent";

const CLASSIFIER_PROMPT: &str = r#"You classify requests for a Zammad helpdesk.

Decide whether the user wants to CREATE a new ticket, SEARCH for / look at existing tickets, or UPDATE an existing ticket. If the request is none of these, or you cannot tell, answer "unknown". Never guess.

IMPORTANT: Respond ONLY with a JSON object, no other text:

{
  "intent": "create|search|update|unknown",
  "confidence": 0.0-1.0,
  "reasoning": "one short sentence",
  "ticket_id": number or null,
  "subject": string or null,
  "body": string or null,
  "requester": email address or null,
  "state": "new|open|closed|pending reminder|pending close" or null,
  "priority": "low|normal|high" or null,
  "query": string or null,
  "message": string or null
}

Field rules:
- "requester" is the email address of the person the ticket is for.
- "message" is text the user wants posted on an existing ticket.
- "query" is free text to search for; use "*" when the user wants all tickets.
- Leave a field null when the request does not state it. Do not invent values.

Examples:

User: "please open a ticket: printer jammed, reporter alice@example.com"
{"intent":"create","confidence":0.95,"reasoning":"asks to open a ticket","ticket_id":null,"subject":"printer jammed","body":null,"requester":"alice@example.com","state":null,"priority":null,"query":null,"message":null}

User: "what's going on with ticket 42?"
{"intent":"search","confidence":0.9,"reasoning":"asks about one ticket","ticket_id":42,"subject":null,"body":null,"requester":null,"state":null,"priority":null,"query":null,"message":null}

User: "close #42 and tell them the toner was replaced"
{"intent":"update","confidence":0.9,"reasoning":"closes a ticket with a reply","ticket_id":42,"subject":null,"body":null,"requester":null,"state":"closed","priority":null,"query":null,"message":"The toner was replaced."}

User: "what's the weather like?"
{"intent":"unknown","confidence":0.95,"reasoning":"not a ticketing request","ticket_id":null,"subject":null,"body":null,"requester":null,"state":null,"priority":null,"query":null,"message":null}"#;

/// Loads prompt text from a directory with built-in fallbacks.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load `<name>.prompt`, or `None` if the file does not exist.
    pub fn load(&self, name: &str) -> Result<Option<String>> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(TicketingError::Validation(format!(
                "invalid prompt name '{name}'"
            )));
        }

        let path = self.dir.join(format!("{name}.prompt"));
        match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => {
                warn!(path = %path.display(), "Prompt file is empty, ignoring it");
                Ok(None)
            }
            Ok(text) => {
                debug!(path = %path.display(), "Loaded prompt file");
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The classifier prompt: the prompt file if present, else the built-in.
    pub fn classifier_prompt(&self) -> Result<String> {
        Ok(self
            .load(CLASSIFIER_PROMPT_NAME)?
            .unwrap_or_else(|| CLASSIFIER_PROMPT.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let library = PromptLibrary::new(dir.path());
        let prompt = library.classifier_prompt().unwrap();
        assert!(prompt.contains("\"intent\""));
    }

    #[test]
    fn prompt_file_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ticket_classifier_agent.prompt"),
            "Answer with JSON only.",
        )
        .unwrap();
        let library = PromptLibrary::new(dir.path());
        assert_eq!(library.classifier_prompt().unwrap(), "Answer with JSON only.");
    }

    #[test]
    fn path_like_names_are_rejected() {
        let library = PromptLibrary::new("prompts");
        assert!(library.load("../secrets").is_err());
        assert!(library.load("a/b").is_err());
    }
}

//! Error types for the ticketing orchestrator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TicketingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not determine what to do with the request: {0}")]
    ClassificationAmbiguous(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The field changes were applied, the follow-up message was not.
    #[error("ticket {ticket_id} was updated but the message was not posted: {source}")]
    MessageNotPosted {
        ticket_id: u64,
        source: Box<TicketingError>,
    },

    #[error("Orchestration definition error at {location}: {message}")]
    Definition { location: String, message: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures reported by the ticketing backend, one variant per cause.
///
/// None of these are retried by the client; the caller decides.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by backend: {0}")]
    Rejected(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {status}: {body}")]
    Unexpected { status: u16, body: String },

    #[error("could not decode backend response: {0}")]
    Decode(String),
}

impl TicketingError {
    pub fn definition(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Whether the process should stop rather than report and carry on.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MessageNotPosted { source, .. } => source.is_fatal(),
            other => matches!(
                other,
                Self::Config(_)
                    | Self::Definition { .. }
                    | Self::Backend(BackendError::Unauthorized(_))
            ),
        }
    }

    /// Text shown to the person who typed the request.
    pub fn user_message(&self) -> String {
        match self {
            Self::ClassificationAmbiguous(_) => {
                "I couldn't tell whether you want to create, search or update a ticket. \
                 Please rephrase, e.g. \"open a ticket: <subject>, reporter <email>\"."
                    .to_string()
            }
            Self::Validation(msg) => format!("Missing or invalid input: {msg}"),
            Self::Backend(BackendError::NotFound(what)) => format!("Not found: {what}"),
            Self::Backend(BackendError::Unauthorized(_)) => {
                "The ticketing system rejected our credentials.".to_string()
            }
            Self::Backend(BackendError::Timeout(secs)) => {
                format!("The ticketing system did not answer within {secs}s.")
            }
            Self::Backend(other) => format!("The ticketing system reported an error: {other}"),
            Self::MessageNotPosted { ticket_id, source } => format!(
                "Ticket #{ticket_id} was updated, but the message was not posted. {}",
                source.user_message()
            ),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TicketingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_distinctly() {
        let err = TicketingError::from(BackendError::NotFound("ticket 42".into()));
        assert_eq!(err.to_string(), "Backend error: not found: ticket 42");
        assert!(matches!(
            err,
            TicketingError::Backend(BackendError::NotFound(_))
        ));
    }

    #[test]
    fn definition_error_carries_location() {
        let err = TicketingError::definition("steps[1] (close)", "unknown step reference");
        assert_eq!(
            err.to_string(),
            "Orchestration definition error at steps[1] (close): unknown step reference"
        );
    }

    #[test]
    fn fatal_errors() {
        assert!(TicketingError::Config("ZAMMAD_URL".into()).is_fatal());
        assert!(TicketingError::Backend(BackendError::Unauthorized("401".into())).is_fatal());
        assert!(!TicketingError::Validation("subject".into()).is_fatal());
        assert!(!TicketingError::Backend(BackendError::NotFound("1".into())).is_fatal());
    }

    #[test]
    fn message_not_posted_keeps_cause() {
        let err = TicketingError::MessageNotPosted {
            ticket_id: 7,
            source: Box::new(BackendError::Unauthorized("401".into()).into()),
        };
        assert!(err.to_string().starts_with("ticket 7 was updated"));
        assert!(err.user_message().contains("Ticket #7 was updated"));
        assert!(err.user_message().contains("credentials"));
        assert!(err.is_fatal());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn user_message_for_timeout() {
        let err = TicketingError::Backend(BackendError::Timeout(30));
        assert!(err.user_message().contains("30s"));
    }
}

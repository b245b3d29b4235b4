//! Incoming user requests.

use serde::{Deserialize, Serialize};

/// Structured fields a caller may supply alongside (or instead of) free text.
///
/// Explicit fields always win over anything a classifier extracts from text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RequestFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A single unit of user intent, created per interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRequest {
    /// Unique request ID, used to correlate log lines
    pub id: String,

    /// Free text as typed by the user (may be empty for structured requests)
    pub text: String,

    /// Structured fields
    #[serde(default)]
    pub fields: RequestFields,

    /// Timestamp (Unix millis)
    pub timestamp: u64,
}

impl TicketRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            fields: RequestFields::default(),
            timestamp: now_millis(),
        }
    }

    pub fn structured(fields: RequestFields) -> Self {
        Self {
            fields,
            ..Self::text("")
        }
    }

    pub fn with_fields(mut self, fields: RequestFields) -> Self {
        self.fields = fields;
        self
    }

    /// First characters of the text, for log lines.
    pub fn preview(&self) -> String {
        self.text.chars().take(50).collect()
    }
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

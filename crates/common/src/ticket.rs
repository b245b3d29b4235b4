//! Ticket representations exchanged with the backend.
//!
//! These are views of backend state, never an authoritative copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ticket as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,

    /// Human-facing ticket number (e.g. "31001")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,

    pub subject: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    /// Body of the first article; only filled when articles were fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// One-line summary used in rendered responses.
    pub fn summary(&self) -> String {
        let mut line = format!("#{} {}", self.id, self.subject);
        if let Some(ref status) = self.status {
            line.push_str(&format!(" [{status}]"));
        }
        if let Some(ref priority) = self.priority {
            line.push_str(&format!(" ({priority})"));
        }
        if let Some(ref requester) = self.requester {
            line.push_str(&format!(" - {requester}"));
        }
        line
    }
}

/// Fields for creating a ticket. Subject and requester are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTicket {
    pub subject: String,
    pub requester: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Backend priority id; names are resolved before a ticket is built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl NewTicket {
    pub fn new(subject: impl Into<String>, requester: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            requester: requester.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Names of required fields that are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.subject.trim().is_empty() {
            missing.push("subject");
        }
        if self.requester.trim().is_empty() {
            missing.push("requester");
        }
        missing
    }
}

/// A partial update. Unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A message on a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: u64,
    pub ticket_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub internal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Attachment {
    /// Name used when the backend reports none.
    pub fn default_name(id: u64) -> String {
        format!("attachment-{id}")
    }
}

/// A message to append to an existing ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub ticket_id: u64,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default)]
    pub internal: bool,
    /// Article type, e.g. "note" or "email"
    #[serde(default = "default_article_kind")]
    pub kind: String,
}

fn default_article_kind() -> String {
    "note".into()
}

impl NewArticle {
    pub fn note(ticket_id: u64, body: impl Into<String>) -> Self {
        Self {
            ticket_id,
            body: body.into(),
            subject: None,
            internal: false,
            kind: default_article_kind(),
        }
    }
}

/// Ticket priority as defined on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    pub id: u64,
    pub name: String,
}

/// Consolidated view of a ticket and its conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketDetails {
    pub ticket: Ticket,
    pub articles: Vec<Article>,
}

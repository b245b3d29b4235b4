//! Zammad JSON shapes and their mapping onto the shared ticket types.
//!
//! Requests use `expand=true`, so state, priority, customer and group arrive
//! as names next to their `*_id` columns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketing_common::{
    Article, Attachment, BackendError, NewArticle, NewTicket, Priority, Ticket, TicketUpdate,
};

#[derive(Debug, Deserialize)]
pub(crate) struct TicketRecord {
    pub id: u64,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<TicketRecord> for Ticket {
    fn from(r: TicketRecord) -> Self {
        Ticket {
            id: r.id,
            number: r.number,
            subject: r.title,
            status: r.state,
            priority: r.priority,
            requester: r.customer,
            group: r.group,
            body: None,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArticleRecord {
    pub id: u64,
    pub ticket_id: u64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachmentRecord {
    pub id: u64,
    #[serde(default)]
    pub filename: String,
    /// Zammad sends the size as a string
    #[serde(default)]
    pub size: Option<serde_json::Value>,
    #[serde(default)]
    pub preferences: Option<serde_json::Value>,
}

impl From<AttachmentRecord> for Attachment {
    fn from(r: AttachmentRecord) -> Self {
        let size = r.size.as_ref().and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        });
        let content_type = r
            .preferences
            .as_ref()
            .and_then(|p| p.get("Content-Type"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let filename = if r.filename.is_empty() {
            Attachment::default_name(r.id)
        } else {
            r.filename
        };
        Attachment {
            id: r.id,
            filename,
            size,
            content_type,
        }
    }
}

impl From<ArticleRecord> for Article {
    fn from(r: ArticleRecord) -> Self {
        Article {
            id: r.id,
            ticket_id: r.ticket_id,
            subject: r.subject,
            body: r.body.unwrap_or_default(),
            internal: r.internal,
            kind: r.kind,
            sender: r.sender,
            created_at: r.created_at,
            attachments: r.attachments.into_iter().map(Attachment::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PriorityRecord {
    pub id: u64,
    pub name: String,
}

impl From<PriorityRecord> for Priority {
    fn from(r: PriorityRecord) -> Self {
        Priority {
            id: r.id,
            name: r.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserRecord {
    pub id: u64,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserRecord {
    pub fn display_name(&self) -> String {
        self.login
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("user {}", self.id))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateTicketBody<'a> {
    pub title: &'a str,
    pub group: &'a str,
    /// `guess:<email>` lets Zammad find or create the customer
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<ArticleBody<'a>>,
}

impl<'a> CreateTicketBody<'a> {
    pub fn new(ticket: &'a NewTicket, default_group: &'a str) -> Self {
        Self {
            title: ticket.subject.trim(),
            group: ticket.group.as_deref().unwrap_or(default_group),
            customer_id: format!("guess:{}", ticket.requester.trim()),
            priority_id: ticket.priority_id,
            article: ticket.body.as_deref().map(|body| ArticleBody {
                ticket_id: None,
                subject: Some(ticket.subject.trim()),
                body,
                kind: "note",
                internal: false,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ArticleBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<&'a str>,
    pub body: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub internal: bool,
}

impl<'a> From<&'a NewArticle> for ArticleBody<'a> {
    fn from(a: &'a NewArticle) -> Self {
        Self {
            ticket_id: Some(a.ticket_id),
            subject: a.subject.as_deref(),
            body: &a.body,
            kind: &a.kind,
            internal: a.internal,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateTicketBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<&'a str>,
}

impl<'a> From<&'a TicketUpdate> for UpdateTicketBody<'a> {
    fn from(u: &'a TicketUpdate) -> Self {
        Self {
            title: u.subject.as_deref(),
            state: u.state.as_deref(),
            priority_id: u.priority_id,
            group: u.group.as_deref(),
        }
    }
}

/// Map a non-success status to the matching backend error.
pub(crate) fn status_error(status: u16, body: &str, what: &str) -> BackendError {
    let detail = error_detail(body);
    match status {
        401 | 403 => BackendError::Unauthorized(detail.unwrap_or_else(|| format!("HTTP {status}"))),
        404 => BackendError::NotFound(what.to_string()),
        400 | 422 => BackendError::Rejected(detail.unwrap_or_else(|| body.to_string())),
        429 => BackendError::RateLimited(detail.unwrap_or_else(|| "too many requests".into())),
        _ => BackendError::Unexpected {
            status,
            body: detail.unwrap_or_else(|| body.chars().take(500).collect()),
        },
    }
}

/// Zammad reports errors as `{"error": "...", "error_human": "..."}`.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error_human")
        .or_else(|| value.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

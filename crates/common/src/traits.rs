//! Core subagent trait.
//!
//! Defined in `ticketing-common` so that both the coordinator and the agents
//! crate can reference it without circular dependencies.

use crate::{Intent, IntentKind, Result, Ticket, TicketDetails};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a subagent produced on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Created { ticket: Ticket },
    Found { tickets: Vec<Ticket> },
    Details { details: TicketDetails },
    Updated { ticket: Ticket, message_posted: bool },
}

impl Outcome {
    /// The ticket id most relevant to this outcome, used for step references.
    pub fn ticket_id(&self) -> Option<u64> {
        match self {
            Self::Created { ticket } | Self::Updated { ticket, .. } => Some(ticket.id),
            Self::Details { details } => Some(details.ticket.id),
            Self::Found { tickets } => tickets.first().map(|t| t.id),
        }
    }

    /// Render for the person who made the request.
    pub fn render(&self) -> String {
        match self {
            Self::Created { ticket } => format!("Created ticket {}", ticket.summary()),
            Self::Found { tickets } if tickets.is_empty() => "No matching tickets.".to_string(),
            Self::Found { tickets } => {
                let mut out = format!("Found {} ticket(s):", tickets.len());
                for ticket in tickets {
                    out.push_str("\n  ");
                    out.push_str(&ticket.summary());
                }
                out
            }
            Self::Details { details } => {
                let mut out = details.ticket.summary();
                for article in &details.articles {
                    let from = article.sender.as_deref().unwrap_or("unknown");
                    out.push_str(&format!("\n  [{from}] {}", article.body.trim()));
                    for attachment in &article.attachments {
                        out.push_str(&format!(
                            "\n    attachment {}: {}",
                            attachment.id, attachment.filename
                        ));
                    }
                }
                out
            }
            Self::Updated {
                ticket,
                message_posted,
            } => {
                let mut out = format!("Updated ticket {}", ticket.summary());
                if *message_posted {
                    out.push_str(" (message posted)");
                }
                out
            }
        }
    }
}

/// A single-purpose handler performing one ticketing operation.
#[async_trait]
pub trait Subagent: Send + Sync {
    /// Stable identifier, also used as the `agent` name in orchestration files.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// The intent this subagent serves.
    fn kind(&self) -> IntentKind;

    /// Perform the operation for `intent`.
    ///
    /// Implementations must reject intents of another kind and must validate
    /// required parameters before touching the backend.
    async fn handle(&self, intent: &Intent) -> Result<Outcome>;
}

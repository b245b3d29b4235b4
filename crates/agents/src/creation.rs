//! Creation subagent - opens new tickets.

use crate::mismatched_intent;
use async_trait::async_trait;
use std::sync::Arc;
use ticketing_common::{
    Intent, IntentKind, NewTicket, Outcome, Result, Subagent, TicketingError,
};
use ticketing_zammad::TicketBackend;
use tracing::{info, warn};

/// Creates a ticket from a `create` intent.
///
/// Subject and requester are required. Nothing is defaulted: a request
/// without them is rejected before the backend is contacted.
pub struct CreationAgent {
    backend: Arc<dyn TicketBackend>,
}

impl CreationAgent {
    pub const ID: &'static str = "create";

    pub fn new(backend: Arc<dyn TicketBackend>) -> Self {
        Self { backend }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Subagent for CreationAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Ticket Creation Agent"
    }

    fn kind(&self) -> IntentKind {
        IntentKind::Create
    }

    async fn handle(&self, intent: &Intent) -> Result<Outcome> {
        let Intent::Create(params) = intent else {
            return Err(mismatched_intent(self.id(), intent));
        };

        let mut ticket = NewTicket {
            subject: trimmed(&params.subject).unwrap_or_default(),
            requester: trimmed(&params.requester).unwrap_or_default(),
            body: trimmed(&params.body),
            priority_id: None,
            group: None,
        };

        let missing = ticket.missing_fields();
        if !missing.is_empty() {
            warn!(agent = %self.id(), missing = ?missing, "Create request incomplete");
            return Err(TicketingError::Validation(format!(
                "a new ticket needs {}",
                missing.join(" and ")
            )));
        }
        if !ticket.requester.contains('@') {
            return Err(TicketingError::Validation(format!(
                "requester '{}' is not an email address",
                ticket.requester
            )));
        }

        if let Some(name) = trimmed(&params.priority) {
            let id = self.backend.resolve_priority(&name).await?.ok_or_else(|| {
                TicketingError::Validation(format!("unknown priority '{name}'"))
            })?;
            ticket.priority_id = Some(id);
        }

        info!(
            agent = %self.id(),
            subject = %ticket.subject,
            requester = %ticket.requester,
            "Creating ticket"
        );
        let created = self.backend.create_ticket(&ticket).await?;
        info!(agent = %self.id(), ticket_id = created.id, "Ticket created");

        Ok(Outcome::Created { ticket: created })
    }
}

//! Search subagent - looks up tickets.

use crate::mismatched_intent;
use async_trait::async_trait;
use std::sync::Arc;
use ticketing_common::{Intent, IntentKind, Outcome, Result, Subagent, TicketingError};
use ticketing_zammad::TicketBackend;
use tracing::info;

/// Result count used when a search names no limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Answers `search` intents.
///
/// A ticket id returns that ticket with its articles. A query runs a
/// backend search; `*` or `all` lists every ticket.
pub struct SearchAgent {
    backend: Arc<dyn TicketBackend>,
}

impl SearchAgent {
    pub const ID: &'static str = "search";

    pub fn new(backend: Arc<dyn TicketBackend>) -> Self {
        Self { backend }
    }
}

fn lists_everything(query: &str) -> bool {
    query == "*" || query.eq_ignore_ascii_case("all")
}

#[async_trait]
impl Subagent for SearchAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Ticket Search Agent"
    }

    fn kind(&self) -> IntentKind {
        IntentKind::Search
    }

    async fn handle(&self, intent: &Intent) -> Result<Outcome> {
        let Intent::Search(params) = intent else {
            return Err(mismatched_intent(self.id(), intent));
        };

        if let Some(id) = params.ticket_id {
            info!(agent = %self.id(), ticket_id = id, "Fetching ticket details");
            let details = self.backend.ticket_details(id).await?;
            return Ok(Outcome::Details { details });
        }

        let query = params
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                TicketingError::Validation("a search needs a ticket id or a query".into())
            })?;

        let tickets = if lists_everything(query) {
            info!(agent = %self.id(), "Listing all tickets");
            let mut all = self.backend.list_tickets().await?;
            if let Some(limit) = params.limit {
                all.truncate(limit);
            }
            all
        } else {
            let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
            info!(agent = %self.id(), query, limit, "Searching tickets");
            self.backend.search_tickets(query, limit).await?
        };

        info!(agent = %self.id(), hits = tickets.len(), "Search finished");
        Ok(Outcome::Found { tickets })
    }
}

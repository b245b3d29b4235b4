//! The ticketing backend contract.

use async_trait::async_trait;
use ticketing_common::{
    Article, NewArticle, NewTicket, Priority, Result, Ticket, TicketDetails, TicketUpdate,
};

/// Operations the orchestrator needs from a ticketing system.
///
/// Every call is a live, single-attempt request against the backend; nothing
/// is cached and nothing is retried.
#[async_trait]
pub trait TicketBackend: Send + Sync {
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket>;

    async fn get_ticket(&self, id: u64) -> Result<Ticket>;

    async fn search_tickets(&self, query: &str, limit: usize) -> Result<Vec<Ticket>>;

    async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> Result<Ticket>;

    /// Every ticket visible to the configured account.
    async fn list_tickets(&self) -> Result<Vec<Ticket>>;

    async fn ticket_articles(&self, ticket_id: u64) -> Result<Vec<Article>>;

    async fn add_article(&self, article: &NewArticle) -> Result<Article>;

    async fn priorities(&self) -> Result<Vec<Priority>>;

    /// Login of the authenticated account.
    async fn current_user(&self) -> Result<String>;

    async fn download_attachment(
        &self,
        ticket_id: u64,
        article_id: u64,
        attachment_id: u64,
    ) -> Result<Vec<u8>>;

    /// Ticket plus its articles; `body` is taken from the first article.
    async fn ticket_details(&self, id: u64) -> Result<TicketDetails> {
        let mut ticket = self.get_ticket(id).await?;
        let articles = self.ticket_articles(id).await?;
        if ticket.body.is_none() {
            ticket.body = articles.first().map(|a| a.body.clone());
        }
        Ok(TicketDetails { ticket, articles })
    }

    /// Resolve a priority name (case-insensitive) or a numeric id string.
    async fn resolve_priority(&self, name_or_id: &str) -> Result<Option<u64>> {
        let wanted = name_or_id.trim();
        let priorities = self.priorities().await?;

        if let Ok(id) = wanted.parse::<u64>() {
            return Ok(priorities.iter().find(|p| p.id == id).map(|p| p.id));
        }

        let wanted = wanted.to_lowercase();
        let exact = priorities.iter().find(|p| p.name.to_lowercase() == wanted);
        // Zammad names look like "3 high"; accept the bare word too.
        let by_word = || {
            priorities.iter().find(|p| {
                p.name
                    .to_lowercase()
                    .split_whitespace()
                    .any(|word| word == wanted)
            })
        };
        Ok(exact.or_else(by_word).map(|p| p.id))
    }
}

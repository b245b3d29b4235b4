//! In-process backend for offline runs and tests.

use crate::backend::TicketBackend;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use ticketing_common::{
    Article, BackendError, NewArticle, NewTicket, Priority, Result, Ticket, TicketUpdate,
    TicketingError,
};

#[derive(Default)]
struct Store {
    tickets: BTreeMap<u64, Ticket>,
    articles: Vec<Article>,
    next_ticket_id: u64,
    next_article_id: u64,
}

/// A `TicketBackend` kept entirely in memory.
///
/// Mirrors the Zammad client's validation and not-found behaviour and counts
/// every call, so tests can assert that no backend call was made.
pub struct InMemoryBackend {
    store: Mutex<Store>,
    priorities: Vec<Priority>,
    default_group: String,
    calls: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store {
                next_ticket_id: 1,
                next_article_id: 1,
                ..Default::default()
            }),
            priorities: vec![
                Priority { id: 1, name: "1 low".into() },
                Priority { id: 2, name: "2 normal".into() },
                Priority { id: 3, name: "3 high".into() },
            ],
            default_group: "Users".into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of backend operations performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn ticket_count(&self) -> usize {
        self.store.lock().tickets.len()
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn priority_name(&self, id: u64) -> Option<String> {
        self.priorities.iter().find(|p| p.id == id).map(|p| p.name.clone())
    }

    fn not_found(what: String) -> TicketingError {
        BackendError::NotFound(what).into()
    }
}

#[async_trait]
impl TicketBackend for InMemoryBackend {
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        self.record_call();
        let missing = ticket.missing_fields();
        if !missing.is_empty() {
            return Err(TicketingError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }
        let priority = match ticket.priority_id {
            Some(pid) => self.priority_name(pid).ok_or_else(|| {
                BackendError::Rejected(format!("unknown priority_id {pid}"))
            })?,
            None => "2 normal".into(),
        };

        let mut store = self.store.lock();
        let id = store.next_ticket_id;
        store.next_ticket_id += 1;
        let now = Utc::now();

        let created = Ticket {
            id,
            number: Some(format!("{}", 31000 + id)),
            subject: ticket.subject.trim().to_string(),
            status: Some("new".into()),
            priority: Some(priority),
            requester: Some(ticket.requester.trim().to_string()),
            group: Some(ticket.group.clone().unwrap_or_else(|| self.default_group.clone())),
            body: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        store.tickets.insert(id, created.clone());

        if let Some(ref body) = ticket.body {
            let article_id = store.next_article_id;
            store.next_article_id += 1;
            store.articles.push(Article {
                id: article_id,
                ticket_id: id,
                subject: Some(created.subject.clone()),
                body: body.clone(),
                internal: false,
                kind: Some("note".into()),
                sender: Some("Customer".into()),
                created_at: Some(now),
                attachments: Vec::new(),
            });
        }

        Ok(created)
    }

    async fn get_ticket(&self, id: u64) -> Result<Ticket> {
        self.record_call();
        self.store
            .lock()
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("ticket {id}")))
    }

    async fn search_tickets(&self, query: &str, limit: usize) -> Result<Vec<Ticket>> {
        self.record_call();
        let needle = query.trim().to_lowercase();
        let store = self.store.lock();
        Ok(store
            .tickets
            .values()
            .filter(|t| {
                needle.is_empty()
                    || t.subject.to_lowercase().contains(&needle)
                    || t.requester
                        .as_deref()
                        .is_some_and(|r| r.to_lowercase().contains(&needle))
                    || t.status.as_deref().is_some_and(|s| s.to_lowercase() == needle)
            })
            .take(limit.max(1))
            .cloned()
            .collect())
    }

    async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> Result<Ticket> {
        self.record_call();
        if update.is_empty() {
            return Err(TicketingError::Validation(
                "update contains no fields".into(),
            ));
        }
        let priority = match update.priority_id {
            Some(pid) => Some(self.priority_name(pid).ok_or_else(|| {
                BackendError::Rejected(format!("unknown priority_id {pid}"))
            })?),
            None => None,
        };

        let mut store = self.store.lock();
        let ticket = store
            .tickets
            .get_mut(&id)
            .ok_or_else(|| Self::not_found(format!("ticket {id}")))?;

        if let Some(ref subject) = update.subject {
            ticket.subject = subject.clone();
        }
        if let Some(ref state) = update.state {
            ticket.status = Some(state.clone());
        }
        if priority.is_some() {
            ticket.priority = priority;
        }
        if let Some(ref group) = update.group {
            ticket.group = Some(group.clone());
        }
        ticket.updated_at = Some(Utc::now());
        Ok(ticket.clone())
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.record_call();
        Ok(self.store.lock().tickets.values().cloned().collect())
    }

    async fn ticket_articles(&self, ticket_id: u64) -> Result<Vec<Article>> {
        self.record_call();
        let store = self.store.lock();
        if !store.tickets.contains_key(&ticket_id) {
            return Err(Self::not_found(format!("ticket {ticket_id}")));
        }
        Ok(store
            .articles
            .iter()
            .filter(|a| a.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn add_article(&self, article: &NewArticle) -> Result<Article> {
        self.record_call();
        if article.body.trim().is_empty() {
            return Err(TicketingError::Validation(
                "message body must not be empty".into(),
            ));
        }
        let mut store = self.store.lock();
        if !store.tickets.contains_key(&article.ticket_id) {
            return Err(Self::not_found(format!("ticket {}", article.ticket_id)));
        }
        let id = store.next_article_id;
        store.next_article_id += 1;
        let created = Article {
            id,
            ticket_id: article.ticket_id,
            subject: article.subject.clone(),
            body: article.body.clone(),
            internal: article.internal,
            kind: Some(article.kind.clone()),
            sender: Some("Agent".into()),
            created_at: Some(Utc::now()),
            attachments: Vec::new(),
        };
        store.articles.push(created.clone());
        Ok(created)
    }

    async fn priorities(&self) -> Result<Vec<Priority>> {
        self.record_call();
        Ok(self.priorities.clone())
    }

    async fn current_user(&self) -> Result<String> {
        self.record_call();
        Ok("offline".into())
    }

    async fn download_attachment(
        &self,
        _ticket_id: u64,
        article_id: u64,
        attachment_id: u64,
    ) -> Result<Vec<u8>> {
        self.record_call();
        Err(Self::not_found(format!(
            "attachment {attachment_id} of article {article_id}"
        )))
    }
}

//! Update subagent - changes ticket fields and posts messages.

use crate::mismatched_intent;
use async_trait::async_trait;
use std::sync::Arc;
use ticketing_common::{
    Intent, IntentKind, NewArticle, Outcome, Result, Subagent, TicketUpdate, TicketingError,
};
use ticketing_zammad::TicketBackend;
use tracing::{info, warn};

/// Applies `update` intents.
///
/// Field changes go out in a single PUT; a message is posted as a note
/// article after the PUT succeeds.
pub struct UpdateAgent {
    backend: Arc<dyn TicketBackend>,
}

impl UpdateAgent {
    pub const ID: &'static str = "update";

    pub fn new(backend: Arc<dyn TicketBackend>) -> Self {
        Self { backend }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl Subagent for UpdateAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    fn name(&self) -> &str {
        "Ticket Update Agent"
    }

    fn kind(&self) -> IntentKind {
        IntentKind::Update
    }

    async fn handle(&self, intent: &Intent) -> Result<Outcome> {
        let Intent::Update(params) = intent else {
            return Err(mismatched_intent(self.id(), intent));
        };

        let ticket_id = params
            .ticket_id
            .ok_or_else(|| TicketingError::Validation("an update needs a ticket id".into()))?;

        let subject = non_blank(&params.subject);
        let state = non_blank(&params.state);
        let priority = non_blank(&params.priority);
        let message = non_blank(&params.message);

        if subject.is_none() && state.is_none() && priority.is_none() && message.is_none() {
            warn!(agent = %self.id(), ticket_id, "Update request has no changes");
            return Err(TicketingError::Validation(
                "an update needs at least one change (state, priority, subject or message)".into(),
            ));
        }

        let priority_id = match priority {
            Some(name) => Some(self.backend.resolve_priority(name).await?.ok_or_else(|| {
                TicketingError::Validation(format!("unknown priority '{name}'"))
            })?),
            None => None,
        };

        let update = TicketUpdate {
            subject: subject.map(str::to_string),
            state: state.map(str::to_string),
            priority_id,
            group: None,
        };

        let ticket = if update.is_empty() {
            self.backend.get_ticket(ticket_id).await?
        } else {
            info!(agent = %self.id(), ticket_id, ?update, "Updating ticket");
            self.backend.update_ticket(ticket_id, &update).await?
        };

        let message_posted = match message {
            Some(body) => {
                let posted = self.backend.add_article(&NewArticle::note(ticket_id, body)).await;
                let article = match posted {
                    Ok(article) => article,
                    Err(err) if !update.is_empty() => {
                        warn!(
                            agent = %self.id(),
                            ticket_id,
                            error = %err,
                            "Ticket updated but message not posted"
                        );
                        return Err(TicketingError::MessageNotPosted {
                            ticket_id,
                            source: Box::new(err),
                        });
                    }
                    Err(err) => return Err(err),
                };
                info!(agent = %self.id(), ticket_id, article_id = article.id, "Message posted");
                true
            }
            None => false,
        };

        Ok(Outcome::Updated {
            ticket,
            message_posted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticketing_common::{BackendError, NewTicket, UpdateParams};
    use ticketing_zammad::InMemoryBackend;

    async fn seeded() -> (UpdateAgent, Arc<InMemoryBackend>, u64) {
        let backend = Arc::new(InMemoryBackend::new());
        let ticket = backend
            .create_ticket(&NewTicket::new("VPN down", "bob@example.com"))
            .await
            .unwrap();
        (UpdateAgent::new(backend.clone()), backend, ticket.id)
    }

    #[tokio::test]
    async fn closes_ticket_and_posts_message() {
        let (agent, backend, id) = seeded().await;
        let outcome = agent
            .handle(&Intent::Update(UpdateParams {
                ticket_id: Some(id),
                state: Some("closed".into()),
                priority: Some("high".into()),
                message: Some("fixed the tunnel config".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        let Outcome::Updated {
            ticket,
            message_posted,
        } = outcome
        else {
            panic!("expected updated");
        };
        assert_eq!(ticket.status.as_deref(), Some("closed"));
        assert_eq!(ticket.priority.as_deref(), Some("3 high"));
        assert!(message_posted);

        let articles = backend.ticket_articles(id).await.unwrap();
        assert_eq!(articles.last().unwrap().body, "fixed the tunnel config");
    }

    #[tokio::test]
    async fn message_only_skips_the_put() {
        let (agent, _, id) = seeded().await;
        let outcome = agent
            .handle(&Intent::Update(UpdateParams {
                ticket_id: Some(id),
                message: Some("any news?".into()),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Updated {
                message_posted: true,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn applying_twice_gives_the_same_ticket() {
        let (agent, _, id) = seeded().await;
        let intent = Intent::Update(UpdateParams {
            ticket_id: Some(id),
            state: Some("open".into()),
            ..Default::default()
        });
        let Outcome::Updated { ticket: first, .. } = agent.handle(&intent).await.unwrap() else {
            panic!("expected updated");
        };
        let Outcome::Updated { ticket: second, .. } = agent.handle(&intent).await.unwrap() else {
            panic!("expected updated");
        };
        assert_eq!(first.status, second.status);
        assert_eq!(first.subject, second.subject);
        assert_eq!(first.priority, second.priority);
    }

    #[tokio::test]
    async fn missing_ticket_id_makes_no_backend_call() {
        let (agent, backend, _) = seeded().await;
        let before = backend.calls();
        let err = agent
            .handle(&Intent::Update(UpdateParams {
                state: Some("closed".into()),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Validation(_)));
        assert_eq!(backend.calls(), before);
    }

    #[tokio::test]
    async fn no_changes_is_validation_error() {
        let (agent, backend, id) = seeded().await;
        let before = backend.calls();
        let err = agent
            .handle(&Intent::Update(UpdateParams {
                ticket_id: Some(id),
                message: Some(" ".into()),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Validation(_)));
        assert_eq!(backend.calls(), before);
    }

    #[tokio::test]
    async fn unknown_priority_is_rejected() {
        let (agent, _, id) = seeded().await;
        let err = agent
            .handle(&Intent::Update(UpdateParams {
                ticket_id: Some(id),
                priority: Some("urgent".into()),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, TicketingError::Validation(ref m) if m.contains("urgent")));
    }

    #[tokio::test]
    async fn unknown_ticket_surfaces_backend_error() {
        let (agent, _, _) = seeded().await;
        let err = agent
            .handle(&Intent::Update(UpdateParams {
                ticket_id: Some(404),
                state: Some("closed".into()),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TicketingError::Backend(BackendError::NotFound(_))
        ));
    }
}

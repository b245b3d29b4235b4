//! HTTP client for the Zammad REST API.

use crate::backend::TicketBackend;
use crate::config::{ZammadAuth, ZammadConfig};
use crate::wire::{
    status_error, ArticleBody, ArticleRecord, CreateTicketBody, PriorityRecord, TicketRecord,
    UpdateTicketBody, UserRecord,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use ticketing_common::{
    Article, BackendError, NewArticle, NewTicket, Priority, Result, Ticket, TicketUpdate,
    TicketingError,
};
use tracing::{debug, info};

/// Upper bound on pages fetched by `list_tickets`.
const MAX_PAGES: usize = 1000;

/// Zammad REST client.
///
/// Holds only connection configuration and a pooled `reqwest::Client`, so
/// clones are cheap and safe to share across concurrent requests.
#[derive(Clone)]
pub struct ZammadClient {
    config: Arc<ZammadConfig>,
    http: reqwest::Client,
}

impl ZammadClient {
    pub fn new(config: ZammadConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TicketingError::Config(format!("Failed to build HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            timeout_secs = config.timeout_secs,
            "Zammad client configured"
        );

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    pub fn config(&self) -> &ZammadConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.config.api_url(path));
        match &self.config.auth {
            ZammadAuth::Token(token) => {
                builder.header(reqwest::header::AUTHORIZATION, format!("Token token={token}"))
            }
            ZammadAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    /// Send once and return the response if its status is a success.
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        debug!(status = status.as_u16(), what, "Zammad responded");

        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body, what).into())
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        let response = self.send(builder, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(format!("{what}: {e}")).into())
    }

    fn transport_error(&self, e: reqwest::Error) -> TicketingError {
        if e.is_timeout() {
            BackendError::Timeout(self.config.timeout_secs).into()
        } else {
            BackendError::Network(e.to_string()).into()
        }
    }
}

#[async_trait]
impl TicketBackend for ZammadClient {
    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket> {
        let missing = ticket.missing_fields();
        if !missing.is_empty() {
            return Err(TicketingError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let body = CreateTicketBody::new(ticket, &self.config.default_group);
        let record: TicketRecord = self
            .send_json(
                self.request(Method::POST, "tickets")
                    .query(&[("expand", "true")])
                    .json(&body),
                "create ticket",
            )
            .await?;

        info!(ticket_id = record.id, "Ticket created");
        Ok(record.into())
    }

    async fn get_ticket(&self, id: u64) -> Result<Ticket> {
        let record: TicketRecord = self
            .send_json(
                self.request(Method::GET, &format!("tickets/{id}"))
                    .query(&[("expand", "true")]),
                &format!("ticket {id}"),
            )
            .await?;
        Ok(record.into())
    }

    async fn search_tickets(&self, query: &str, limit: usize) -> Result<Vec<Ticket>> {
        let limit = limit.max(1).to_string();
        let records: Vec<TicketRecord> = self
            .send_json(
                self.request(Method::GET, "tickets/search").query(&[
                    ("query", query),
                    ("limit", limit.as_str()),
                    ("expand", "true"),
                ]),
                "ticket search",
            )
            .await?;
        debug!(query, hits = records.len(), "Ticket search finished");
        Ok(records.into_iter().map(Ticket::from).collect())
    }

    async fn update_ticket(&self, id: u64, update: &TicketUpdate) -> Result<Ticket> {
        if update.is_empty() {
            return Err(TicketingError::Validation(
                "update contains no fields".into(),
            ));
        }

        let record: TicketRecord = self
            .send_json(
                self.request(Method::PUT, &format!("tickets/{id}"))
                    .query(&[("expand", "true")])
                    .json(&UpdateTicketBody::from(update)),
                &format!("ticket {id}"),
            )
            .await?;

        info!(ticket_id = id, "Ticket updated");
        Ok(record.into())
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let per_page = self.config.per_page.max(1);
        let per_page_param = per_page.to_string();
        let mut tickets = Vec::new();

        for page in 1..=MAX_PAGES {
            let page_param = page.to_string();
            let records: Vec<TicketRecord> = self
                .send_json(
                    self.request(Method::GET, "tickets").query(&[
                        ("page", page_param.as_str()),
                        ("per_page", per_page_param.as_str()),
                        ("expand", "true"),
                    ]),
                    "ticket list",
                )
                .await?;

            let fetched = records.len();
            tickets.extend(records.into_iter().map(Ticket::from));
            if fetched < per_page {
                break;
            }
        }

        debug!(count = tickets.len(), "Listed tickets");
        Ok(tickets)
    }

    async fn ticket_articles(&self, ticket_id: u64) -> Result<Vec<Article>> {
        let records: Vec<ArticleRecord> = self
            .send_json(
                self.request(Method::GET, &format!("ticket_articles/by_ticket/{ticket_id}"))
                    .query(&[("expand", "true")]),
                &format!("articles of ticket {ticket_id}"),
            )
            .await?;
        Ok(records
            .into_iter()
            .filter(|a| a.ticket_id == ticket_id)
            .map(Article::from)
            .collect())
    }

    async fn add_article(&self, article: &NewArticle) -> Result<Article> {
        if article.body.trim().is_empty() {
            return Err(TicketingError::Validation(
                "message body must not be empty".into(),
            ));
        }

        let record: ArticleRecord = self
            .send_json(
                self.request(Method::POST, "ticket_articles")
                    .query(&[("expand", "true")])
                    .json(&ArticleBody::from(article)),
                &format!("ticket {}", article.ticket_id),
            )
            .await?;

        info!(ticket_id = article.ticket_id, article_id = record.id, "Article added");
        Ok(record.into())
    }

    async fn priorities(&self) -> Result<Vec<Priority>> {
        let records: Vec<PriorityRecord> = self
            .send_json(self.request(Method::GET, "ticket_priorities"), "ticket priorities")
            .await?;
        Ok(records.into_iter().map(Priority::from).collect())
    }

    async fn current_user(&self) -> Result<String> {
        let user: UserRecord = self
            .send_json(self.request(Method::GET, "users/me"), "current user")
            .await?;
        Ok(user.display_name())
    }

    async fn download_attachment(
        &self,
        ticket_id: u64,
        article_id: u64,
        attachment_id: u64,
    ) -> Result<Vec<u8>> {
        let what = format!("attachment {attachment_id} of article {article_id}");
        let response = self
            .send(
                self.request(
                    Method::GET,
                    &format!("ticket_attachment/{ticket_id}/{article_id}/{attachment_id}"),
                ),
                &what,
            )
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e))?;
        Ok(bytes.to_vec())
    }
}

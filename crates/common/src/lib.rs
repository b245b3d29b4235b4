//! Common types and traits shared across the ticketing crates.
//!
//! This crate provides the request, ticket and intent types every
//! component passes around, the error taxonomy, and the `Subagent` trait.

pub mod error;
pub mod intent;
pub mod request;
pub mod security;
pub mod ticket;
pub mod traits;

pub use error::{BackendError, Result, TicketingError};
pub use intent::{Classification, CreateParams, Intent, IntentKind, SearchParams, UpdateParams};
pub use request::{RequestFields, TicketRequest};
pub use ticket::{
    Article, Attachment, NewArticle, NewTicket, Priority, Ticket, TicketDetails, TicketUpdate,
};
pub use traits::{Outcome, Subagent};

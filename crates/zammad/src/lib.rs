//! Ticketing client for the Zammad REST API.
//!
//! ```text
//! Subagent ──► TicketBackend ──► ZammadClient ──HTTP──► Zammad /api/v1
//!                    │
//!                    └─────────► InMemoryBackend (offline / tests)
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod memory;
mod wire;

pub use backend::TicketBackend;
pub use client::ZammadClient;
pub use config::{ZammadAuth, ZammadConfig};
pub use memory::InMemoryBackend;

//! Ticketing assistant binary.
//!
//! Usage:
//!   ticketing                          # interactive chat (default)
//!   ticketing run flows/escalate.yaml  # run an orchestration definition
//!   ticketing check flows/escalate.yaml
//!   ticketing classify "close ticket #12"
//!   ticketing --offline chat           # in-memory backend, no Zammad needed
//!
//! # Environment Variables
//!
//! - `ZAMMAD_URL` - Zammad base URL (required unless `--offline`)
//! - `ZAMMAD_TOKEN` or `ZAMMAD_USERNAME` + `ZAMMAD_PASSWORD` - credentials
//! - `TICKETING_CLASSIFIER` - `keyword` (default) or `llm`
//! - `RUST_LOG` - log filter; logs go to stderr

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod chat;
mod cli;
mod setup;

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "warn,ticketing=info,ticketing_coordinator=info,ticketing_zammad=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if dotenv_loaded {
        tracing::debug!("Loaded .env file");
    }

    let cli = cli::Cli::parse();
    cli::run(cli).await
}

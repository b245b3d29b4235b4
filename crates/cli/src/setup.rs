//! Wiring of configuration, backend and orchestrator for a command.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use ticketing_coordinator::{build_classifier, AppConfig, Orchestrator};
use ticketing_zammad::{InMemoryBackend, TicketBackend, ZammadClient};
use tracing::{info, warn};

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = AppConfig::load(path, &env_lookup).context("failed to load configuration")?;
    if let Some(path) = path {
        info!(path = %path.display(), "Loaded configuration file");
    }
    Ok(config)
}

/// The Zammad client, or an in-memory backend when `offline`.
pub async fn backend(
    config: &AppConfig,
    offline: bool,
    skip_preflight: bool,
) -> Result<Arc<dyn TicketBackend>> {
    if offline {
        warn!("Offline mode: tickets live in memory and are lost on exit");
        return Ok(Arc::new(InMemoryBackend::new()));
    }

    let zammad = config.zammad_config(&env_lookup)?;
    let url = zammad.base_url.clone();
    let client = ZammadClient::new(zammad)?;

    if skip_preflight {
        info!(url = %url, "Skipping Zammad preflight check");
    } else {
        let user = client
            .current_user()
            .await
            .with_context(|| format!("preflight check against {url} failed"))?;
        info!(url = %url, user = %user, "Connected to Zammad");
    }
    Ok(Arc::new(client))
}

pub async fn orchestrator(
    config: &AppConfig,
    offline: bool,
    skip_preflight: bool,
) -> Result<Arc<Orchestrator>> {
    let classifier = build_classifier(config)?;
    let backend = backend(config, offline, skip_preflight).await?;
    Ok(Arc::new(Orchestrator::with_backend(classifier, backend)))
}

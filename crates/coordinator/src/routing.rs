//! Intent-to-subagent routing.

use std::sync::Arc;
use ticketing_common::{IntentKind, Subagent};
use tracing::warn;

/// The action subagents known to the orchestrator, keyed by intent.
#[derive(Clone, Default)]
pub struct SubagentRegistry {
    agents: Vec<Arc<dyn Subagent>>,
}

impl SubagentRegistry {
    pub fn new(agents: Vec<Arc<dyn Subagent>>) -> Self {
        let mut registry = Self::default();
        for agent in agents {
            registry.register(agent);
        }
        registry
    }

    /// Add `agent`. The first agent registered for an intent keeps it.
    pub fn register(&mut self, agent: Arc<dyn Subagent>) {
        if agent.kind() == IntentKind::Unknown {
            warn!(agent = %agent.id(), "Ignoring subagent for the unknown intent");
            return;
        }
        if let Some(existing) = self.for_intent(agent.kind()) {
            warn!(
                intent = %agent.kind(),
                kept = %existing.id(),
                ignored = %agent.id(),
                "Duplicate subagent for intent"
            );
            return;
        }
        self.agents.push(agent);
    }

    pub fn for_intent(&self, kind: IntentKind) -> Option<&Arc<dyn Subagent>> {
        self.agents.iter().find(|a| a.kind() == kind)
    }

    pub fn by_id(&self, id: &str) -> Option<&Arc<dyn Subagent>> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.id()).collect()
    }
}

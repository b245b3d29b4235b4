//! Request orchestrator.
//!
//! Drives one request through classification and dispatch:
//!
//! ```text
//! Idle ──► Classifying ──► Dispatching ──► Done
//!  │            │               │
//!  │            └──► Failed ◄───┘
//!  └──────────► Dispatching        (structured requests skip classification)
//! ```
//!
//! Every request ends in exactly one terminal state and produces exactly one
//! [`Response`]. Nothing is retried.

use crate::routing::SubagentRegistry;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use ticketing_agents::{action_agents, Classifier};
use ticketing_common::{
    Classification, Intent, IntentKind, Outcome, Result, Subagent, TicketRequest, TicketingError,
};
use ticketing_zammad::TicketBackend;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorState {
    Idle,
    Classifying,
    Dispatching,
    Done,
    Failed,
}

impl OrchestratorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrchestratorState::*;
        matches!(
            (self, next),
            (Idle, Classifying)
                | (Idle, Dispatching)
                | (Idle, Failed)
                | (Classifying, Dispatching)
                | (Classifying, Failed)
                | (Dispatching, Done)
                | (Dispatching, Failed)
        )
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Classifying => "classifying",
            Self::Dispatching => "dispatching",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The single answer to one request.
#[derive(Debug)]
pub struct Response {
    pub request_id: String,

    /// States visited, starting at `Idle` and ending in a terminal state
    pub states: Vec<OrchestratorState>,

    /// Present when the request went through classification
    pub classification: Option<Classification>,

    /// Id of the subagent that handled the request, if one was reached
    pub agent: Option<String>,

    pub result: Result<Outcome>,
}

impl Response {
    pub fn state(&self) -> OrchestratorState {
        self.states.last().copied().unwrap_or(OrchestratorState::Idle)
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&TicketingError> {
        self.result.as_ref().err()
    }

    /// Text for the person who made the request.
    pub fn render(&self) -> String {
        match &self.result {
            Ok(outcome) => outcome.render(),
            Err(err) => err.user_message(),
        }
    }

    pub fn into_result(self) -> Result<Outcome> {
        self.result
    }

    /// A request refused before classification or dispatch began.
    pub fn rejected(request_id: &str, error: TicketingError) -> Self {
        Run::new(request_id).finish(Err(error))
    }
}

/// Per-request run record.
struct Run {
    request_id: String,
    states: Vec<OrchestratorState>,
    classification: Option<Classification>,
    agent: Option<String>,
}

impl Run {
    fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            states: vec![OrchestratorState::Idle],
            classification: None,
            agent: None,
        }
    }

    fn current(&self) -> OrchestratorState {
        self.states.last().copied().unwrap_or(OrchestratorState::Idle)
    }

    fn advance(&mut self, next: OrchestratorState) {
        let current = self.current();
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {current} -> {next}"
        );
        debug!(request_id = %self.request_id, from = %current, to = %next, "State transition");
        self.states.push(next);
    }

    fn finish(mut self, result: Result<Outcome>) -> Response {
        match &result {
            Ok(outcome) => {
                self.advance(OrchestratorState::Done);
                info!(
                    request_id = %self.request_id,
                    ticket_id = ?outcome.ticket_id(),
                    state = %OrchestratorState::Done,
                    "Request completed"
                );
            }
            Err(err) => {
                self.advance(OrchestratorState::Failed);
                warn!(
                    request_id = %self.request_id,
                    error = %err,
                    state = %OrchestratorState::Failed,
                    "Request failed"
                );
            }
        }
        Response {
            request_id: self.request_id,
            states: self.states,
            classification: self.classification,
            agent: self.agent,
            result,
        }
    }
}

/// Routes requests to subagents.
///
/// Holds only shared, immutable components; all per-request state lives
/// in a run record local to [`Orchestrator::handle`].
pub struct Orchestrator {
    classifier: Arc<dyn Classifier>,
    registry: SubagentRegistry,
}

impl Orchestrator {
    pub fn new(classifier: Arc<dyn Classifier>, agents: Vec<Arc<dyn Subagent>>) -> Self {
        let registry = SubagentRegistry::new(agents);
        info!(
            classifier = classifier.name(),
            agents = ?registry.ids(),
            "Orchestrator initialized"
        );
        Self {
            classifier,
            registry,
        }
    }

    /// Orchestrator with the standard create/search/update agents.
    pub fn with_backend(classifier: Arc<dyn Classifier>, backend: Arc<dyn TicketBackend>) -> Self {
        Self::new(classifier, action_agents(backend))
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn registry(&self) -> &SubagentRegistry {
        &self.registry
    }

    /// Classify text without dispatching.
    pub async fn classify(&self, text: &str) -> Result<Classification> {
        self.classifier.classify(text).await
    }

    /// Classify a free-text request and dispatch it to the matching subagent.
    ///
    /// Structured fields on the request override anything the classifier
    /// extracted. An `unknown` classification fails without contacting the
    /// backend.
    pub async fn handle(&self, request: TicketRequest) -> Response {
        let mut run = Run::new(&request.id);
        info!(
            request_id = %request.id,
            content_preview = %request.preview(),
            classifier = self.classifier.name(),
            "Handling request"
        );

        run.advance(OrchestratorState::Classifying);
        let classification = match self.classifier.classify(&request.text).await {
            Ok(classification) => classification,
            Err(err) => return run.finish(Err(err)),
        };
        info!(
            request_id = %request.id,
            intent = %classification.kind(),
            confidence = classification.confidence,
            reasoning = %classification.reasoning,
            "Request classified"
        );

        let intent = classification.intent.clone().with_fields(&request.fields);
        run.classification = Some(classification);

        if let Intent::Unknown { reason } = &intent {
            let err = TicketingError::ClassificationAmbiguous(reason.clone());
            return run.finish(Err(err));
        }

        run.advance(OrchestratorState::Dispatching);
        let result = self.run_agent(&mut run, &intent).await;
        run.finish(result)
    }

    /// Dispatch an already-structured intent, skipping classification.
    pub async fn dispatch(&self, request_id: &str, intent: Intent) -> Response {
        let mut run = Run::new(request_id);
        info!(request_id, intent = %intent.kind(), "Dispatching structured request");

        if let Intent::Unknown { reason } = &intent {
            let err = TicketingError::ClassificationAmbiguous(reason.clone());
            return run.finish(Err(err));
        }

        run.advance(OrchestratorState::Dispatching);
        let result = self.run_agent(&mut run, &intent).await;
        run.finish(result)
    }

    async fn run_agent(&self, run: &mut Run, intent: &Intent) -> Result<Outcome> {
        let kind = intent.kind();
        let agent = self.registry.for_intent(kind).ok_or_else(|| {
            TicketingError::Config(format!("no subagent registered for intent '{kind}'"))
        })?;
        run.agent = Some(agent.id().to_string());

        debug!(request_id = %run.request_id, agent = %agent.id(), ?intent, "Invoking subagent");
        agent.handle(intent).await
    }

    /// The subagent registered for `kind`, if any.
    pub fn agent_for(&self, kind: IntentKind) -> Option<&Arc<dyn Subagent>> {
        self.registry.for_intent(kind)
    }
}

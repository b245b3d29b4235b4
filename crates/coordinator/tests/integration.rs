//! Integration tests for the orchestrator and the definition runner.
//!
//! These tests use the keyword classifier and the in-memory backend so they
//! work without Zammad or an LLM.

use async_trait::async_trait;
use std::sync::Arc;
use ticketing_agents::{Classifier, KeywordClassifier};
use ticketing_common::{
    BackendError, Classification, Intent, IntentKind, Outcome, Result, SearchParams,
    TicketRequest, TicketingError,
};
use ticketing_coordinator::{
    AppConfig, DefinitionRunner, OrchestrationDefinition, Orchestrator, OrchestratorState,
};
use ticketing_zammad::{InMemoryBackend, TicketBackend};

/// Helper to create an orchestrator over a fresh in-memory backend.
fn create_test_orchestrator() -> (Arc<Orchestrator>, Arc<InMemoryBackend>) {
    let backend = Arc::new(InMemoryBackend::new());
    let orchestrator = Orchestrator::with_backend(
        Arc::new(KeywordClassifier::default()),
        backend.clone() as Arc<dyn TicketBackend>,
    );
    (Arc::new(orchestrator), backend)
}

/// Always answers with the same classification.
struct StubClassifier(Classification);

#[async_trait]
impl Classifier for StubClassifier {
    fn name(&self) -> &str {
        "stub"
    }

    async fn classify(&self, _text: &str) -> Result<Classification> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Request handling
// ============================================================================

#[tokio::test]
async fn test_printer_jam_request_creates_ticket() {
    let (orchestrator, backend) = create_test_orchestrator();
    let response = orchestrator
        .handle(TicketRequest::text(
            "please open a ticket: printer jammed, reporter alice@example.com",
        ))
        .await;

    assert_eq!(response.state(), OrchestratorState::Done);
    let classification = response.classification.as_ref().unwrap();
    assert_eq!(classification.kind(), IntentKind::Create);
    assert!(classification.confidence >= 0.5);

    let Some(Outcome::Created { ticket }) = response.outcome() else {
        panic!("expected created outcome, got {:?}", response.result);
    };
    assert!(ticket.id > 0);
    assert_eq!(ticket.subject, "printer jammed");
    assert_eq!(ticket.requester.as_deref(), Some("alice@example.com"));
    assert_eq!(backend.ticket_count(), 1);
}

#[tokio::test]
async fn test_created_ticket_is_found_by_id() {
    let (orchestrator, _) = create_test_orchestrator();
    let created = orchestrator
        .handle(TicketRequest::text(
            "open a ticket: VPN drops every hour, reporter bob@example.com",
        ))
        .await
        .into_result()
        .unwrap();
    let id = created.ticket_id().unwrap();

    let response = orchestrator
        .handle(TicketRequest::text(format!("what is the status of ticket #{id}?")))
        .await;
    let Some(Outcome::Details { details }) = response.outcome() else {
        panic!("expected ticket details, got {:?}", response.result);
    };
    assert_eq!(details.ticket.id, id);
    assert_eq!(details.ticket.subject, "VPN drops every hour");
}

#[tokio::test]
async fn test_unknown_request_never_reaches_backend() {
    let (orchestrator, backend) = create_test_orchestrator();
    for text in ["hello there", "what's the weather tomorrow?", ""] {
        let response = orchestrator.handle(TicketRequest::text(text)).await;
        assert_eq!(response.state(), OrchestratorState::Failed, "{text:?}");
        assert!(matches!(
            response.error(),
            Some(TicketingError::ClassificationAmbiguous(_))
        ));
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_low_confidence_stub_becomes_unknown() {
    let backend = Arc::new(InMemoryBackend::new());
    let classification = Classification {
        intent: Intent::Search(SearchParams {
            query: Some("printer".into()),
            ..Default::default()
        }),
        confidence: 0.2,
        reasoning: "guess".into(),
    }
    .apply_threshold(0.5);
    let orchestrator =
        Orchestrator::with_backend(Arc::new(StubClassifier(classification)), backend.clone());

    let response = orchestrator.handle(TicketRequest::text("printer?")).await;
    assert_eq!(
        response.states,
        vec![
            OrchestratorState::Idle,
            OrchestratorState::Classifying,
            OrchestratorState::Failed
        ]
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_not_found_is_surfaced_distinctly() {
    let (orchestrator, _) = create_test_orchestrator();
    let response = orchestrator
        .dispatch(
            "req-404",
            Intent::Search(SearchParams {
                ticket_id: Some(4242),
                ..Default::default()
            }),
        )
        .await;

    assert!(matches!(
        response.error(),
        Some(TicketingError::Backend(BackendError::NotFound(_)))
    ));
    assert_eq!(response.render(), "Not found: ticket 4242");
}

#[tokio::test]
async fn test_update_is_idempotent() {
    let (orchestrator, _) = create_test_orchestrator();
    orchestrator
        .handle(TicketRequest::text(
            "open a ticket: printer jammed, reporter alice@example.com",
        ))
        .await
        .into_result()
        .unwrap();

    let mut rendered = Vec::new();
    for _ in 0..2 {
        let response = orchestrator
            .handle(TicketRequest::text("close ticket #1"))
            .await;
        let Some(Outcome::Updated { ticket, .. }) = response.outcome() else {
            panic!("expected update, got {:?}", response.result);
        };
        assert_eq!(ticket.status.as_deref(), Some("closed"));
        rendered.push(ticket.subject.clone());
    }
    assert_eq!(rendered[0], rendered[1]);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_missing_zammad_url_is_a_config_error() {
    let config = AppConfig::default();
    let err = config.zammad_config(&|_| None).unwrap_err();
    assert!(matches!(err, TicketingError::Config(ref m) if m.contains("ZAMMAD_URL")));
}

// ============================================================================
// Orchestration definitions
// ============================================================================

const ESCALATION: &str = r#"
name: printer-escalation
description: open a ticket, escalate it, then look it up
steps:
  - name: open
    agent: create
    input:
      subject: printer jammed
      requester: alice@example.com
      body: Paper stuck in tray 2
  - name: escalate
    agent: update
    input:
      ticket_id: ${steps.open.ticket_id}
      priority: high
      message: "Escalating ticket ${steps.open.ticket_id}"
  - name: check
    agent: search
    input:
      ticket_id: ${steps.open.ticket_id}
"#;

#[tokio::test]
async fn test_definition_steps_share_ticket_ids() {
    let (orchestrator, backend) = create_test_orchestrator();
    let definition = OrchestrationDefinition::from_yaml_str(ESCALATION, "escalation.yaml").unwrap();
    let report = DefinitionRunner::new(orchestrator).run(&definition).await;

    assert!(report.success, "{}", report.render());
    assert_eq!(report.steps.len(), 3);
    assert!(report.first_error().is_none());

    let Some(Outcome::Updated { ticket, message_posted }) = report.steps[1].response.outcome()
    else {
        panic!("expected update outcome");
    };
    assert_eq!(ticket.priority.as_deref(), Some("3 high"));
    assert!(message_posted);

    let Some(Outcome::Details { details }) = report.steps[2].response.outcome() else {
        panic!("expected details outcome");
    };
    assert!(details
        .articles
        .iter()
        .any(|a| a.body == "Escalating ticket 1"));
    assert_eq!(backend.ticket_count(), 1);
    assert!(report.render().contains("3/3 step(s) succeeded"));
}

#[tokio::test]
async fn test_run_stops_at_first_failure() {
    let yaml = r#"
name: missing-ticket
steps:
  - name: close
    agent: update
    input: { ticket_id: 99, state: closed }
  - name: never
    agent: create
    input: { subject: s, requester: a@example.com }
"#;
    let (orchestrator, backend) = create_test_orchestrator();
    let definition = OrchestrationDefinition::from_yaml_str(yaml, "inline").unwrap();
    let report = DefinitionRunner::new(orchestrator).run(&definition).await;

    assert!(!report.success);
    assert_eq!(report.steps.len(), 1);
    assert!(matches!(
        report.first_error(),
        Some(TicketingError::Backend(BackendError::NotFound(_)))
    ));
    assert_eq!(backend.ticket_count(), 0);
    assert!(report.render().contains("1 step(s) not run"));
}

#[tokio::test]
async fn test_classify_step_runs_full_request_path() {
    let yaml = r#"
name: from-chat
steps:
  - name: triage
    agent: classify
    input:
      text: "open a ticket: monitor flickers, reporter carol@example.com"
  - name: close
    agent: update
    input:
      ticket_id: ${steps.triage.ticket_id}
      state: closed
"#;
    let (orchestrator, _) = create_test_orchestrator();
    let definition = OrchestrationDefinition::from_yaml_str(yaml, "inline").unwrap();
    let report = DefinitionRunner::new(orchestrator).run(&definition).await;

    assert!(report.success, "{}", report.render());
    let first = &report.steps[0].response;
    assert_eq!(first.classification.as_ref().map(|c| c.kind()), Some(IntentKind::Create));
    assert_eq!(
        report.steps[1].response.states.first(),
        Some(&OrchestratorState::Idle)
    );
}

#[tokio::test]
async fn test_empty_search_result_breaks_reference() {
    let yaml = r#"
name: lookup-then-close
steps:
  - name: lookup
    agent: search
    input: { query: nothing-matches-this }
  - name: close
    agent: update
    input:
      ticket_id: ${steps.lookup.ticket_id}
      state: closed
"#;
    let (orchestrator, backend) = create_test_orchestrator();
    let definition = OrchestrationDefinition::from_yaml_str(yaml, "inline").unwrap();
    let report = DefinitionRunner::new(orchestrator).run(&definition).await;

    assert!(!report.success);
    assert_eq!(report.steps.len(), 2);
    assert!(matches!(
        report.first_error(),
        Some(TicketingError::Validation(ref m)) if m.contains("'lookup'")
    ));
    // only the search reached the backend
    assert_eq!(backend.calls(), 1);
}

#[test]
fn test_definition_file_errors_name_the_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(
        &path,
        "name: bad\nsteps:\n  - name: first\n    agent: search\n    input: { query: x }\n  - name: second\n    agent: create\n    input: { subject: s }\n",
    )
    .unwrap();

    let err = OrchestrationDefinition::from_file(&path).unwrap_err();
    let TicketingError::Definition { location, message } = err else {
        panic!("expected definition error");
    };
    assert!(location.ends_with("steps[1] (second)"), "{location}");
    assert!(message.starts_with("input.requester"), "{message}");
}

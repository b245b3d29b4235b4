//! Sequential execution of orchestration definitions.
//!
//! Steps run in order, one at a time. A step may use the ticket id produced
//! by an earlier step through `${steps.<name>.ticket_id}`. The run stops at
//! the first failing step.

use crate::definition::{
    substitute_references, OrchestrationDefinition, StepAgent, StepDefinition, StepInput,
    TicketRef,
};
use crate::orchestrator::{Orchestrator, Response};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use ticketing_common::{Intent, TicketRequest, TicketingError};
use tracing::{debug, error, info};

/// Result of one executed step.
#[derive(Debug)]
pub struct StepReport {
    pub name: String,
    pub agent: String,
    pub response: Response,
    pub duration_ms: u64,
}

impl StepReport {
    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }
}

/// Result of running a whole definition.
#[derive(Debug)]
pub struct RunReport {
    pub definition: String,

    /// Steps that ran; steps after the first failure are absent
    pub steps: Vec<StepReport>,

    pub total_steps: usize,
    pub success: bool,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn first_error(&self) -> Option<&TicketingError> {
        self.steps.iter().find_map(|s| s.response.error())
    }

    /// Per-step report for the terminal.
    pub fn render(&self) -> String {
        let passed = self.steps.iter().filter(|s| s.is_success()).count();
        let mut out = format!(
            "Orchestration '{}': {passed}/{} step(s) succeeded in {} ms",
            self.definition, self.total_steps, self.duration_ms
        );
        for step in &self.steps {
            let mark = if step.is_success() { "ok" } else { "failed" };
            let text = step.response.render().replace('\n', "\n      ");
            out.push_str(&format!(
                "\n  [{mark}] {} ({}, {} ms): {text}",
                step.name, step.agent, step.duration_ms
            ));
        }
        let skipped = self.total_steps - self.steps.len();
        if skipped > 0 {
            out.push_str(&format!("\n  {skipped} step(s) not run"));
        }
        out
    }
}

/// Runs definitions against one orchestrator.
pub struct DefinitionRunner {
    orchestrator: Arc<Orchestrator>,
}

impl DefinitionRunner {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn run(&self, definition: &OrchestrationDefinition) -> RunReport {
        let start_time = Instant::now();
        info!(
            definition = %definition.name,
            steps = definition.steps.len(),
            "Starting orchestration"
        );

        let mut outputs: HashMap<&str, u64> = HashMap::new();
        let mut reports = Vec::with_capacity(definition.steps.len());
        let mut success = true;

        for (i, step) in definition.steps.iter().enumerate() {
            let step_start = Instant::now();
            info!(
                definition = %definition.name,
                step = i + 1,
                name = %step.name,
                agent = %step.agent,
                "Executing step"
            );

            let response = self.run_step(step, &outputs).await;
            let report = StepReport {
                name: step.name.clone(),
                agent: step.agent.clone(),
                duration_ms: step_start.elapsed().as_millis() as u64,
                response,
            };

            let failed = match &report.response.result {
                Ok(outcome) => {
                    debug!(
                        definition = %definition.name,
                        name = %step.name,
                        ticket_id = ?outcome.ticket_id(),
                        "Step completed"
                    );
                    if let Some(id) = outcome.ticket_id() {
                        outputs.insert(step.name.as_str(), id);
                    }
                    false
                }
                Err(e) => {
                    error!(
                        definition = %definition.name,
                        name = %step.name,
                        error = %e,
                        "Step failed"
                    );
                    true
                }
            };
            reports.push(report);
            if failed {
                success = false;
                break;
            }
        }

        info!(
            definition = %definition.name,
            steps = reports.len(),
            success,
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Orchestration completed"
        );

        RunReport {
            definition: definition.name.clone(),
            steps: reports,
            total_steps: definition.steps.len(),
            success,
            duration_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    async fn run_step(&self, step: &StepDefinition, outputs: &HashMap<&str, u64>) -> Response {
        let request = TicketRequest::structured(Default::default());
        let input = match resolve_input(&step.input, outputs) {
            Ok(input) => input,
            Err(err) => return Response::rejected(&request.id, err),
        };

        match step.step_agent() {
            Some(StepAgent::Classify) => {
                let text = input.text.unwrap_or_default();
                self.orchestrator.handle(TicketRequest { text, ..request }).await
            }
            Some(StepAgent::Action(kind)) => {
                let ticket_id = input.ticket_id.as_ref().and_then(TicketRef::literal);
                let mut intent = Intent::from_fields(kind, &input.to_fields(ticket_id));
                if let Intent::Search(params) = &mut intent {
                    params.limit = input.limit;
                }
                self.orchestrator.dispatch(&request.id, intent).await
            }
            None => Response::rejected(
                &request.id,
                TicketingError::definition(
                    format!("step '{}'", step.name),
                    format!("agent: unknown agent '{}'", step.agent),
                ),
            ),
        }
    }
}

/// Replace step references in `input` with the ticket ids produced so far.
fn resolve_input(
    input: &StepInput,
    outputs: &HashMap<&str, u64>,
) -> Result<StepInput, TicketingError> {
    let lookup = |step: &str| outputs.get(step).copied();
    let missing = |field: &str, step: &str| {
        TicketingError::Validation(format!(
            "input.{field}: step '{step}' did not produce a ticket id"
        ))
    };

    let resolve = |field: &str, value: &Option<String>| -> Result<Option<String>, TicketingError> {
        value
            .as_deref()
            .map(|v| substitute_references(v, lookup).map_err(|step| missing(field, step)))
            .transpose()
    };

    let ticket_id = match &input.ticket_id {
        Some(TicketRef::Expr(expr)) => {
            let resolved = substitute_references(expr, lookup)
                .map_err(|step| missing("ticket_id", step))?;
            Some(TicketRef::Expr(resolved))
        }
        other => other.clone(),
    };

    Ok(StepInput {
        text: resolve("text", &input.text)?,
        ticket_id,
        subject: resolve("subject", &input.subject)?,
        body: resolve("body", &input.body)?,
        requester: resolve("requester", &input.requester)?,
        state: resolve("state", &input.state)?,
        priority: resolve("priority", &input.priority)?,
        query: resolve("query", &input.query)?,
        message: resolve("message", &input.message)?,
        limit: input.limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_references_from_earlier_outputs() {
        let input = StepInput {
            ticket_id: Some(TicketRef::Expr("${steps.open.ticket_id}".into())),
            message: Some("follow-up to #${steps.open.ticket_id}".into()),
            state: Some("closed".into()),
            ..Default::default()
        };
        let outputs = HashMap::from([("open", 12)]);
        let resolved = resolve_input(&input, &outputs).unwrap();
        assert_eq!(resolved.ticket_id.and_then(|t| t.literal()), Some(12));
        assert_eq!(resolved.message.as_deref(), Some("follow-up to #12"));
        assert_eq!(resolved.state.as_deref(), Some("closed"));
    }

    #[test]
    fn missing_output_is_a_validation_error() {
        let input = StepInput {
            ticket_id: Some(TicketRef::Expr("${steps.lookup.ticket_id}".into())),
            ..Default::default()
        };
        let err = resolve_input(&input, &HashMap::new()).unwrap_err();
        assert!(matches!(err, TicketingError::Validation(ref m) if m.contains("'lookup'")));
    }
}

//! YAML orchestration definitions.
//!
//! A definition names a sequence of steps, each handled by one subagent:
//!
//! ```yaml
//! name: printer-jam
//! description: open a ticket and escalate it
//! steps:
//!   - name: open
//!     agent: create
//!     input:
//!       subject: printer jammed
//!       requester: alice@example.com
//!   - name: escalate
//!     agent: update
//!     input:
//!       ticket_id: ${steps.open.ticket_id}
//!       priority: high
//! ```
//!
//! Definitions are validated completely when loaded; a definition that loads
//! is safe to run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use ticketing_common::{IntentKind, RequestFields, Result, TicketingError};
use tracing::{debug, info};

static STEP_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\s*steps\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_]+)\s*\}")
        .expect("STEP_REF_RE is a compile-time constant")
});

static STEP_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("STEP_NAME_RE is a compile-time constant")
});

/// The only step output other steps may reference.
pub const TICKET_ID_OUTPUT: &str = "ticket_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestrationDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    pub name: String,

    /// One of `classify`, `create`, `search`, `update`
    pub agent: String,

    #[serde(default)]
    pub input: StepInput,
}

/// A ticket id, given literally or as a reference to an earlier step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TicketRef {
    Id(u64),
    Expr(String),
}

impl TicketRef {
    /// The literal id, when this is not a step reference.
    pub fn literal(&self) -> Option<u64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Expr(expr) => parse_literal_id(expr),
        }
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Expr(expr) => f.write_str(expr),
        }
    }
}

pub(crate) fn parse_literal_id(expr: &str) -> Option<u64> {
    expr.trim().trim_start_matches('#').parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<TicketRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl StepInput {
    /// Set string fields as `(field, value)` pairs.
    fn strings(&self) -> Vec<(&'static str, &str)> {
        [
            ("text", &self.text),
            ("subject", &self.subject),
            ("body", &self.body),
            ("requester", &self.requester),
            ("state", &self.state),
            ("priority", &self.priority),
            ("query", &self.query),
            ("message", &self.message),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }

    /// Names of the fields that are set.
    fn present(&self) -> Vec<&'static str> {
        let mut fields: Vec<&'static str> = self.strings().into_iter().map(|(f, _)| f).collect();
        if self.ticket_id.is_some() {
            fields.push("ticket_id");
        }
        if self.limit.is_some() {
            fields.push("limit");
        }
        fields
    }

    /// Build request fields once every reference has been replaced.
    pub fn to_fields(&self, ticket_id: Option<u64>) -> RequestFields {
        RequestFields {
            ticket_id,
            subject: self.subject.clone(),
            body: self.body.clone(),
            requester: self.requester.clone(),
            state: self.state.clone(),
            priority: self.priority.clone(),
            query: self.query.clone(),
            message: self.message.clone(),
        }
    }
}

/// What handles a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAgent {
    /// Free text through the full classify-then-dispatch path
    Classify,
    /// An action subagent, called directly
    Action(IntentKind),
}

impl StepAgent {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "classify" => Some(Self::Classify),
            "create" => Some(Self::Action(IntentKind::Create)),
            "search" => Some(Self::Action(IntentKind::Search)),
            "update" => Some(Self::Action(IntentKind::Update)),
            _ => None,
        }
    }

    fn allowed_fields(self) -> &'static [&'static str] {
        match self {
            Self::Classify => &["text"],
            Self::Action(IntentKind::Create) => &["subject", "body", "requester", "priority"],
            Self::Action(IntentKind::Search) => &["ticket_id", "query", "limit"],
            Self::Action(IntentKind::Update) => {
                &["ticket_id", "subject", "state", "priority", "message"]
            }
            Self::Action(IntentKind::Unknown) => &[],
        }
    }
}

impl fmt::Display for StepAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classify => f.write_str("classify"),
            Self::Action(kind) => write!(f, "{kind}"),
        }
    }
}

/// Every `${steps.<name>.<output>}` reference in `value`, as `(name, output)`.
pub fn step_references(value: &str) -> Vec<(&str, &str)> {
    STEP_REF_RE
        .captures_iter(value)
        .filter_map(|caps| match (caps.get(1), caps.get(2)) {
            (Some(step), Some(output)) => Some((step.as_str(), output.as_str())),
            _ => None,
        })
        .collect()
}

/// Replace every step reference in `value` using `lookup(step)`.
///
/// Fails with the name of the first step whose output is unavailable.
pub fn substitute_references<'a>(
    value: &'a str,
    lookup: impl Fn(&str) -> Option<u64>,
) -> std::result::Result<String, &'a str> {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    for caps in STEP_REF_RE.captures_iter(value) {
        let (Some(whole), Some(step)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let id = lookup(step.as_str()).ok_or(step.as_str())?;
        out.push_str(&value[last..whole.start()]);
        out.push_str(&id.to_string());
        last = whole.end();
    }
    out.push_str(&value[last..]);
    Ok(out)
}

impl StepDefinition {
    /// The handler for this step. Always `Some` on a validated definition.
    pub fn step_agent(&self) -> Option<StepAgent> {
        StepAgent::parse(&self.agent)
    }

    fn validate(&self, location: &str, earlier: &HashSet<&str>) -> Result<()> {
        let fail = |message: String| Err(TicketingError::definition(location, message));

        let Some(agent) = self.step_agent() else {
            return fail(format!(
                "agent: unknown agent '{}' (expected classify, create, search or update)",
                self.agent
            ));
        };

        let input = &self.input;
        for field in input.present() {
            if !agent.allowed_fields().contains(&field) {
                return fail(format!("input.{field}: not used by the {agent} agent"));
            }
        }
        for (field, value) in input.strings() {
            if value.trim().is_empty() {
                return fail(format!("input.{field}: must not be blank"));
            }
        }

        let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());
        match agent {
            StepAgent::Classify if blank(&input.text) => {
                return fail("input.text: required by the classify agent".into());
            }
            StepAgent::Action(IntentKind::Create) => {
                if blank(&input.subject) {
                    return fail("input.subject: required by the create agent".into());
                }
                if blank(&input.requester) {
                    return fail("input.requester: required by the create agent".into());
                }
            }
            StepAgent::Action(IntentKind::Search)
                if input.ticket_id.is_none() && blank(&input.query) =>
            {
                return fail("input.ticket_id: the search agent needs a ticket_id or a query".into());
            }
            StepAgent::Action(IntentKind::Update) => {
                if input.ticket_id.is_none() {
                    return fail("input.ticket_id: required by the update agent".into());
                }
                let changes = [&input.state, &input.priority, &input.subject, &input.message];
                if changes.iter().all(|c| c.is_none()) {
                    return fail(
                        "input: the update agent needs at least one of state, priority, subject or message"
                            .into(),
                    );
                }
            }
            _ => {}
        }

        if input.limit == Some(0) {
            return fail("input.limit: must be at least 1".into());
        }

        if let Some(ticket_ref) = &input.ticket_id {
            if let TicketRef::Expr(expr) = ticket_ref {
                let refs = step_references(expr);
                let whole_ref = refs.len() == 1 && STEP_REF_RE.replace(expr.trim(), "").is_empty();
                if !whole_ref && parse_literal_id(expr).is_none() {
                    return fail(format!(
                        "input.ticket_id: '{expr}' is neither a ticket id nor a step reference"
                    ));
                }
            }
            check_references("ticket_id", &ticket_ref.to_string(), earlier, location)?;
        }
        for (field, value) in input.strings() {
            check_references(field, value, earlier, location)?;
        }
        Ok(())
    }
}

fn check_references(
    field: &str,
    value: &str,
    earlier: &HashSet<&str>,
    location: &str,
) -> Result<()> {
    for (step, output) in step_references(value) {
        if output != TICKET_ID_OUTPUT {
            return Err(TicketingError::definition(
                location,
                format!("input.{field}: step output '{output}' is not available (only '{TICKET_ID_OUTPUT}')"),
            ));
        }
        if !earlier.contains(step) {
            return Err(TicketingError::definition(
                location,
                format!("input.{field}: references step '{step}', which does not run earlier"),
            ));
        }
    }
    if STEP_REF_RE.replace_all(value, "").contains("${") {
        return Err(TicketingError::definition(
            location,
            format!(
                "input.{field}: malformed step reference in '{value}' \
                 (expected ${{steps.<name>.{TICKET_ID_OUTPUT}}})"
            ),
        ));
    }
    Ok(())
}

impl OrchestrationDefinition {
    /// Parse and validate a definition. `source` names it in error locations.
    pub fn from_yaml_str(yaml: &str, source: &str) -> Result<Self> {
        let definition: Self = serde_yaml::from_str(yaml).map_err(|e| {
            let location = match e.location() {
                Some(loc) => format!("{source}:{}:{}", loc.line(), loc.column()),
                None => source.to_string(),
            };
            TicketingError::definition(location, e.to_string())
        })?;
        definition.validate(source)?;
        debug!(
            definition = %definition.name,
            steps = definition.steps.len(),
            "Orchestration definition validated"
        );
        Ok(definition)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            let location = path.display().to_string();
            TicketingError::definition(location, format!("cannot read file: {e}"))
        })?;
        let definition = Self::from_yaml_str(&content, &path.display().to_string())?;
        info!(path = %path.display(), definition = %definition.name, "Loaded orchestration definition");
        Ok(definition)
    }

    pub fn validate(&self, source: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(TicketingError::definition(source, "name: must not be blank"));
        }
        if self.steps.is_empty() {
            return Err(TicketingError::definition(
                source,
                "steps: at least one step is required",
            ));
        }

        let mut earlier: HashSet<&str> = HashSet::new();
        for (i, step) in self.steps.iter().enumerate() {
            let location = format!("{source}: steps[{i}] ({})", step.name);
            if step.name.trim().is_empty() {
                return Err(TicketingError::definition(location, "name: must not be blank"));
            }
            if !STEP_NAME_RE.is_match(&step.name) {
                return Err(TicketingError::definition(
                    location,
                    format!(
                        "name: '{}' may only contain letters, digits, '-' and '_'",
                        step.name
                    ),
                ));
            }
            if earlier.contains(step.name.as_str()) {
                return Err(TicketingError::definition(
                    location,
                    format!("name: duplicate step name '{}'", step.name),
                ));
            }
            step.validate(&location, &earlier)?;
            earlier.insert(step.name.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> Result<OrchestrationDefinition> {
        OrchestrationDefinition::from_yaml_str(yaml, "test.yaml")
    }

    fn definition_error(yaml: &str) -> (String, String) {
        match load(yaml) {
            Err(TicketingError::Definition { location, message }) => (location, message),
            other => panic!("expected definition error, got {other:?}"),
        }
    }

    const VALID: &str = r#"
name: printer-jam
description: open and escalate
steps:
  - name: open
    agent: create
    input:
      subject: printer jammed
      requester: alice@example.com
  - name: escalate
    agent: update
    input:
      ticket_id: ${steps.open.ticket_id}
      priority: high
      message: "Escalated from ticket ${steps.open.ticket_id}"
  - name: look
    agent: search
    input:
      ticket_id: 7
"#;

    #[test]
    fn loads_valid_definition() {
        let def = load(VALID).unwrap();
        assert_eq!(def.name, "printer-jam");
        assert_eq!(def.steps.len(), 3);
        assert_eq!(
            def.steps[1].input.ticket_id,
            Some(TicketRef::Expr("${steps.open.ticket_id}".into()))
        );
        assert_eq!(def.steps[2].input.ticket_id, Some(TicketRef::Id(7)));
        assert_eq!(
            def.steps[0].step_agent(),
            Some(StepAgent::Action(IntentKind::Create))
        );
    }

    #[test]
    fn syntax_error_reports_line_and_column() {
        let (location, _) = definition_error("name: x\nsteps:\n  - name: [unclosed\n");
        assert!(location.starts_with("test.yaml:"), "{location}");
        assert!(location.split(':').count() >= 3, "{location}");
    }

    #[test]
    fn unknown_field_is_a_shape_error() {
        let (location, message) = definition_error(
            "name: x\nsteps:\n  - name: a\n    agent: search\n    input:\n      colour: red\n",
        );
        assert!(location.starts_with("test.yaml:"));
        assert!(message.contains("colour"), "{message}");
    }

    #[test]
    fn empty_steps_rejected() {
        let (location, message) = definition_error("name: x\nsteps: []\n");
        assert_eq!(location, "test.yaml");
        assert!(message.starts_with("steps:"));
    }

    #[test]
    fn unknown_agent_names_step_and_field() {
        let (location, message) =
            definition_error("name: x\nsteps:\n  - name: zap\n    agent: delete\n");
        assert_eq!(location, "test.yaml: steps[0] (zap)");
        assert!(message.starts_with("agent:"), "{message}");
    }

    #[test]
    fn duplicate_step_names_rejected() {
        let yaml = r#"
name: x
steps:
  - name: a
    agent: search
    input: { query: printer }
  - name: a
    agent: search
    input: { query: vpn }
"#;
        let (location, message) = definition_error(yaml);
        assert_eq!(location, "test.yaml: steps[1] (a)");
        assert!(message.contains("duplicate"));
    }

    #[test]
    fn missing_required_inputs() {
        let create = "name: x\nsteps:\n  - name: a\n    agent: create\n    input: { subject: s }\n";
        assert_eq!(definition_error(create).1, "input.requester: required by the create agent");

        let update = "name: x\nsteps:\n  - name: a\n    agent: update\n    input: { ticket_id: 3 }\n";
        assert!(definition_error(update).1.starts_with("input:"));

        let classify = "name: x\nsteps:\n  - name: a\n    agent: classify\n";
        assert!(definition_error(classify).1.starts_with("input.text:"));
    }

    #[test]
    fn field_not_used_by_agent_rejected() {
        let yaml = "name: x\nsteps:\n  - name: a\n    agent: search\n    input: { query: q, requester: a@b.io }\n";
        assert_eq!(
            definition_error(yaml).1,
            "input.requester: not used by the search agent"
        );
    }

    #[test]
    fn forward_reference_rejected() {
        let yaml = r#"
name: x
steps:
  - name: close
    agent: update
    input:
      ticket_id: ${steps.open.ticket_id}
      state: closed
  - name: open
    agent: create
    input: { subject: s, requester: a@example.com }
"#;
        let (location, message) = definition_error(yaml);
        assert_eq!(location, "test.yaml: steps[0] (close)");
        assert!(message.starts_with("input.ticket_id:"));
        assert!(message.contains("'open'"));
    }

    #[test]
    fn unsupported_output_rejected() {
        let yaml = r#"
name: x
steps:
  - name: open
    agent: create
    input: { subject: s, requester: a@example.com }
  - name: note
    agent: update
    input:
      ticket_id: 1
      message: "see ${steps.open.subject}"
"#;
        let (_, message) = definition_error(yaml);
        assert!(message.starts_with("input.message:"), "{message}");
    }

    #[test]
    fn malformed_ticket_id_rejected() {
        let yaml = "name: x\nsteps:\n  - name: a\n    agent: search\n    input: { ticket_id: soon }\n";
        assert!(definition_error(yaml).1.starts_with("input.ticket_id:"));
    }

    #[test]
    fn hash_prefixed_ticket_id_is_literal() {
        let yaml = "name: x\nsteps:\n  - name: a\n    agent: search\n    input: { ticket_id: '#42' }\n";
        let def = load(yaml).unwrap();
        assert_eq!(def.steps[0].input.ticket_id.as_ref().and_then(TicketRef::literal), Some(42));
    }

    #[test]
    fn substitutes_references() {
        let out = substitute_references("moved to ${steps.open.ticket_id} today", |step| {
            (step == "open").then_some(12)
        })
        .unwrap();
        assert_eq!(out, "moved to 12 today");
        assert_eq!(
            substitute_references("${steps.gone.ticket_id}", |_| None),
            Err("gone")
        );
    }

    #[test]
    fn from_file_uses_path_as_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, "name: x\nsteps: []\n").unwrap();
        let err = OrchestrationDefinition::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("flow.yaml"));
    }

    #[test]
    fn missing_file_is_definition_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        match OrchestrationDefinition::from_file(&path) {
            Err(TicketingError::Definition { location, message }) => {
                assert!(location.ends_with("missing.yaml"), "{location}");
                assert!(message.starts_with("cannot read file"), "{message}");
            }
            other => panic!("expected definition error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_reference_in_text_field_rejected() {
        for message in [
            "${steps.open.ticket_id",
            "${ steps.open }",
            "see ${steps.open.ticket_id} and ${oops}",
        ] {
            let yaml = format!(
                r#"
name: broken
steps:
  - name: open
    agent: create
    input:
      subject: printer jammed
      requester: alice@example.com
  - name: note
    agent: update
    input:
      ticket_id: 1
      message: "{message}"
"#
            );
            let (location, error) = definition_error(&yaml);
            assert!(location.contains("steps[1] (note)"), "{location}");
            assert!(error.contains("input.message: malformed step reference"), "{error}");
        }
    }

    #[test]
    fn step_name_must_be_referenceable() {
        let (location, message) = definition_error(
            r#"
name: spaced
steps:
  - name: open ticket
    agent: create
    input:
      subject: printer jammed
      requester: alice@example.com
"#,
        );
        assert!(location.contains("steps[0] (open ticket)"), "{location}");
        assert!(message.starts_with("name:"), "{message}");
    }
}

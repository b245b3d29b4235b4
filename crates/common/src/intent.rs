//! Classified intents and the parameters extracted for them.

use crate::request::RequestFields;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The label a classifier assigns to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Create,
    Search,
    Update,
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Search => "search",
            Self::Update => "update",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "search" => Ok(Self::Search),
            "update" => Ok(Self::Update),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown intent '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateParams {
    pub subject: Option<String>,
    pub requester: Option<String>,
    pub body: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub ticket_id: Option<u64>,
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub ticket_id: Option<u64>,
    pub subject: Option<String>,
    pub state: Option<String>,
    pub priority: Option<String>,
    /// Text to post on the ticket as a new article
    pub message: Option<String>,
}

/// What the user wants done, with whatever parameters could be extracted.
///
/// Parameters are optional here; each subagent validates what it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "lowercase")]
pub enum Intent {
    Create(CreateParams),
    Search(SearchParams),
    Update(UpdateParams),
    Unknown { reason: String },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Self::Create(_) => IntentKind::Create,
            Self::Search(_) => IntentKind::Search,
            Self::Update(_) => IntentKind::Update,
            Self::Unknown { .. } => IntentKind::Unknown,
        }
    }

    /// Build an intent of `kind` purely from structured fields.
    pub fn from_fields(kind: IntentKind, fields: &RequestFields) -> Self {
        let empty = match kind {
            IntentKind::Create => Self::Create(CreateParams::default()),
            IntentKind::Search => Self::Search(SearchParams::default()),
            IntentKind::Update => Self::Update(UpdateParams::default()),
            IntentKind::Unknown => {
                return Self::Unknown {
                    reason: "no intent given".into(),
                }
            }
        };
        empty.with_fields(fields)
    }

    /// Overlay explicit request fields on top of extracted parameters.
    pub fn with_fields(mut self, fields: &RequestFields) -> Self {
        fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        match &mut self {
            Self::Create(p) => {
                overlay(&mut p.subject, &fields.subject);
                overlay(&mut p.requester, &fields.requester);
                overlay(&mut p.body, &fields.body);
                overlay(&mut p.priority, &fields.priority);
            }
            Self::Search(p) => {
                overlay(&mut p.ticket_id, &fields.ticket_id);
                overlay(&mut p.query, &fields.query);
            }
            Self::Update(p) => {
                overlay(&mut p.ticket_id, &fields.ticket_id);
                overlay(&mut p.subject, &fields.subject);
                overlay(&mut p.state, &fields.state);
                overlay(&mut p.priority, &fields.priority);
                overlay(&mut p.message, &fields.message);
            }
            Self::Unknown { .. } => {}
        }
        self
    }
}

/// The result of classifying one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,

    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,

    /// Short explanation of the decision
    pub reasoning: String,
}

impl Classification {
    pub fn unknown(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            intent: Intent::Unknown {
                reason: reason.clone(),
            },
            confidence: 0.0,
            reasoning: reason,
        }
    }

    pub fn kind(&self) -> IntentKind {
        self.intent.kind()
    }

    /// Downgrade to `Unknown` when confidence is below `threshold`.
    pub fn apply_threshold(self, threshold: f32) -> Self {
        if self.kind() != IntentKind::Unknown && self.confidence < threshold {
            let reason = format!(
                "confidence {:.2} for '{}' is below threshold {:.2}",
                self.confidence,
                self.kind(),
                threshold
            );
            return Self {
                intent: Intent::Unknown { reason },
                confidence: self.confidence,
                reasoning: self.reasoning,
            };
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_kind_parses_case_insensitively() {
        assert_eq!("Create".parse::<IntentKind>().unwrap(), IntentKind::Create);
        assert_eq!(" update ".parse::<IntentKind>().unwrap(), IntentKind::Update);
        assert!("delete".parse::<IntentKind>().is_err());
    }

    #[test]
    fn explicit_fields_override_extracted_params() {
        let extracted = Intent::Create(CreateParams {
            subject: Some("from text".into()),
            requester: Some("bob@example.com".into()),
            ..Default::default()
        });
        let fields = RequestFields {
            subject: Some("explicit".into()),
            ..Default::default()
        };
        let Intent::Create(params) = extracted.with_fields(&fields) else {
            panic!("expected create intent");
        };
        assert_eq!(params.subject.as_deref(), Some("explicit"));
        assert_eq!(params.requester.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn from_fields_builds_update() {
        let fields = RequestFields {
            ticket_id: Some(5),
            state: Some("closed".into()),
            ..Default::default()
        };
        let intent = Intent::from_fields(IntentKind::Update, &fields);
        assert_eq!(
            intent,
            Intent::Update(UpdateParams {
                ticket_id: Some(5),
                state: Some("closed".into()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn low_confidence_becomes_unknown() {
        let classification = Classification {
            intent: Intent::Search(SearchParams::default()),
            confidence: 0.3,
            reasoning: "weak match".into(),
        };
        let result = classification.apply_threshold(0.5);
        assert_eq!(result.kind(), IntentKind::Unknown);
    }

    #[test]
    fn confidence_at_threshold_is_kept() {
        let classification = Classification {
            intent: Intent::Search(SearchParams::default()),
            confidence: 0.5,
            reasoning: "borderline".into(),
        };
        assert_eq!(classification.apply_threshold(0.5).kind(), IntentKind::Search);
    }

    #[test]
    fn intent_serializes_with_tag() {
        let json = serde_json::to_value(Intent::Search(SearchParams {
            ticket_id: Some(9),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(json["intent"], "search");
        assert_eq!(json["ticket_id"], 9);
    }
}

//! Deterministic keyword classifier.

use super::{Classifier, DEFAULT_MIN_CONFIDENCE};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use ticketing_common::security::validate_request_text;
use ticketing_common::{
    Classification, CreateParams, Intent, IntentKind, Result, SearchParams, UpdateParams,
};
use tracing::debug;

fn patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("keyword patterns are compile-time constants"))
        .collect()
}

static CREATE_VOCABULARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"\bcreate\b",
        r"\bopen (?:a|an|new)\b",
        r"\bnew ticket\b",
        r"\braise\b",
        r"\bsubmit\b",
        r"\bfile an?\b",
        r"\blog an?\b",
        r"\breport(?:ing)?\b",
    ])
});

static SEARCH_VOCABULARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"\bsearch\b",
        r"\bfind\b",
        r"\blook ?up\b",
        r"\bshow\b",
        r"\blist\b",
        r"\bstatus of\b",
        r"\bdetails?\b",
        r"\bget\b",
        r"\bwhat(?:'s| is) the status\b",
        r"\bany tickets?\b",
    ])
});

static UPDATE_VOCABULARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    patterns(&[
        r"\bupdate\b",
        r"\bchange\b",
        r"\bset\b",
        r"\bclose\b",
        r"\breopen\b",
        r"\bescalate\b",
        r"\bresolve\b",
        r"\bmark\b",
        r"\breply\b",
        r"\badd (?:a )?(?:note|comment|message)\b",
    ])
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("EMAIL_RE is a compile-time constant")
});

static TICKET_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:#|\bticket\s+(?:#|no\.?\s*|number\s+)?)(\d+)\b")
        .expect("TICKET_ID_RE is a compile-time constant")
});

static MESSAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:message|reply|comment|note)\s*:\s*(.+)$")
        .expect("MESSAGE_RE is a compile-time constant")
});

static STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:state|status)\s*(?:to|=|:|as)?\s*(new|open|closed|pending reminder|pending close|merged)\b",
    )
    .expect("STATE_RE is a compile-time constant")
});

static CLOSE_VERB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:close|resolve)\b").expect("CLOSE_VERB_RE is a compile-time constant")
});

static REOPEN_VERB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\breopen\b").expect("REOPEN_VERB_RE is a compile-time constant")
});

static PRIORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bpriority\s*(?:of\s+\S+\s+)?(?:to|=|:|as)?\s*(\d\s+(?:low|normal|high)|low|normal|high)\b",
    )
    .expect("PRIORITY_RE is a compile-time constant")
});

static PRIORITY_BEFORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(low|normal|high)[- ]priority\b")
        .expect("PRIORITY_BEFORE_RE is a compile-time constant")
});

static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:subject|title)\s*(?:to|=|:)\s*([^,]+)")
        .expect("SUBJECT_RE is a compile-time constant")
});

static TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:about|regarding)\s+(.+)$").expect("TOPIC_RE is a compile-time constant")
});

static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:for|about|matching|containing|mentioning)\s+"?([^"?]+)"?"#)
        .expect("QUERY_RE is a compile-time constant")
});

static ALL_TICKETS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:all|every)\s+tickets?\b|\blist\s+tickets\b")
        .expect("ALL_TICKETS_RE is a compile-time constant")
});

static REQUESTER_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:reported by|requested by|reporter|requester|customer|from|for|by)[\s:]*$",
    )
    .expect("REQUESTER_LABEL_RE is a compile-time constant")
});

/// Keyword-scoring classifier.
///
/// Each intent has a vocabulary of patterns; the intent with the most
/// matches wins. A tie, or no match at all, yields `unknown`.
pub struct KeywordClassifier {
    min_confidence: f32,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl KeywordClassifier {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence: min_confidence.clamp(0.0, 1.0),
        }
    }

    /// Classify without the async wrapper; the work is CPU-only.
    pub fn classify_text(&self, text: &str) -> Classification {
        let scores = [
            (IntentKind::Create, score(&CREATE_VOCABULARY, text)),
            (IntentKind::Search, score(&SEARCH_VOCABULARY, text)),
            (IntentKind::Update, score(&UPDATE_VOCABULARY, text)),
        ];
        let ticket_id = extract_ticket_id(text);

        let mut ranked = scores;
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let (best, top) = ranked[0];
        let runner_up = ranked[1].1;

        debug!(
            create = scores[0].1,
            search = scores[1].1,
            update = scores[2].1,
            has_ticket_id = ticket_id.is_some(),
            "Keyword scores"
        );

        if top == 0 {
            // A bare ticket reference reads as a lookup.
            if ticket_id.is_some() {
                return Classification {
                    intent: extract(IntentKind::Search, text),
                    confidence: 0.6,
                    reasoning: "ticket reference without an action verb".into(),
                }
                .apply_threshold(self.min_confidence);
            }
            return Classification::unknown("no ticketing keywords found");
        }

        if top == runner_up {
            let tied: Vec<&str> = scores
                .iter()
                .filter(|(_, s)| *s == top)
                .map(|(k, _)| k.as_str())
                .collect();
            return Classification {
                intent: extract(best, text),
                confidence: 0.35,
                reasoning: format!("keywords match {} equally", tied.join(" and ")),
            }
            .apply_threshold(self.min_confidence);
        }

        Classification {
            intent: extract(best, text),
            confidence: confidence(top, runner_up),
            reasoning: format!("{top} {best} keyword(s), {runner_up} for the next intent"),
        }
        .apply_threshold(self.min_confidence)
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        validate_request_text(text)?;
        Ok(self.classify_text(text))
    }
}

fn score(vocabulary: &[Regex], text: &str) -> usize {
    vocabulary.iter().filter(|re| re.is_match(text)).count()
}

fn confidence(top: usize, runner_up: usize) -> f32 {
    let margin = (top - runner_up) as f32;
    let extra = (top - 1) as f32;
    (0.55 + 0.1 * margin + 0.05 * extra).min(0.95)
}

/// Pull the parameters for `kind` out of `text`.
fn extract(kind: IntentKind, text: &str) -> Intent {
    match kind {
        IntentKind::Create => Intent::Create(extract_create(text)),
        IntentKind::Search => Intent::Search(extract_search(text)),
        IntentKind::Update => Intent::Update(extract_update(text)),
        IntentKind::Unknown => Intent::Unknown {
            reason: "no ticketing keywords found".into(),
        },
    }
}

fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}

fn extract_ticket_id(text: &str) -> Option<u64> {
    TICKET_ID_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn extract_message(text: &str) -> Option<(String, usize)> {
    let caps = MESSAGE_RE.captures(text)?;
    let whole = caps.get(0)?;
    let message = caps.get(1)?.as_str().trim().to_string();
    (!message.is_empty()).then_some((message, whole.start()))
}

fn extract_priority(text: &str) -> Option<String> {
    PRIORITY_RE
        .captures(text)
        .or_else(|| PRIORITY_BEFORE_RE.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

fn extract_state(text: &str) -> Option<String> {
    if let Some(m) = STATE_RE.captures(text).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_lowercase());
    }
    if REOPEN_VERB_RE.is_match(text) {
        return Some("open".into());
    }
    if CLOSE_VERB_RE.is_match(text) {
        return Some("closed".into());
    }
    None
}

/// Text before a trailing `message:` clause.
fn without_message(text: &str) -> &str {
    match extract_message(text) {
        Some((_, start)) => &text[..start],
        None => text,
    }
}

/// Clean one comma-separated segment of a create request.
///
/// Drops the requester's address and any label around it ("reporter",
/// "from", ...). Segments that only named the requester vanish.
fn clean_segment(segment: &str) -> Option<String> {
    let mut cleaned = segment.trim().to_string();
    if EMAIL_RE.is_match(&cleaned) {
        let without_email = EMAIL_RE.replace_all(&cleaned, "").trim().to_string();
        let without_label = REQUESTER_LABEL_RE.replace(&without_email, "").trim().to_string();
        cleaned = without_label;
    }
    if PRIORITY_RE.is_match(&cleaned) || PRIORITY_BEFORE_RE.is_match(&cleaned) {
        return None;
    }
    let cleaned = cleaned
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!'))
        .to_string();
    (!cleaned.is_empty()).then_some(cleaned)
}

fn extract_create(text: &str) -> CreateParams {
    let text = without_message(text);
    let details = text
        .split_once(':')
        .map(|(_, rest)| rest)
        .or_else(|| TOPIC_RE.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str()));

    let mut segments = details
        .map(|d| d.split(',').filter_map(clean_segment).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();
    let subject = segments.next();
    let rest: Vec<String> = segments.collect();

    CreateParams {
        subject,
        requester: extract_email(text),
        body: (!rest.is_empty()).then(|| rest.join(", ")),
        priority: extract_priority(text),
    }
}

fn extract_search(text: &str) -> SearchParams {
    let ticket_id = extract_ticket_id(text);
    let query = if ALL_TICKETS_RE.is_match(text) {
        Some("*".to_string())
    } else {
        text.split_once(':')
            .map(|(_, rest)| rest.trim().to_string())
            .or_else(|| {
                QUERY_RE
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
            })
            .or_else(|| extract_email(text))
            .filter(|q| !q.is_empty())
    };

    SearchParams {
        ticket_id,
        query,
        limit: None,
    }
}

fn extract_update(text: &str) -> UpdateParams {
    let message = extract_message(text).map(|(m, _)| m);
    let head = without_message(text);

    UpdateParams {
        ticket_id: extract_ticket_id(head),
        subject: SUBJECT_RE
            .captures(head)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string()),
        state: extract_state(head),
        priority: extract_priority(head),
        message,
    }
}

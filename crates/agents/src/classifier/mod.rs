//! Classification subagent.
//!
//! Maps free text to one of `create | search | update | unknown` together
//! with the parameters found in the text. Two strategies sit behind the
//! [`Classifier`] trait:
//!
//! - [`KeywordClassifier`]: deterministic keyword scoring, no network.
//! - [`LlmClassifier`]: asks a language model for a JSON verdict.
//!
//! Both downgrade labels below their confidence threshold to `unknown`.

mod keyword;
mod llm;

pub use keyword::KeywordClassifier;
pub use llm::LlmClassifier;

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use ticketing_common::{Classification, Result};

/// Confidence below which a classification becomes `unknown`.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

/// Fixed interface every classification strategy implements.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Strategy name, for logs.
    fn name(&self) -> &str;

    async fn classify(&self, text: &str) -> Result<Classification>;
}

/// Which classifier the application should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStrategy {
    #[default]
    Keyword,
    Llm,
}

impl fmt::Display for ClassifierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword => f.write_str("keyword"),
            Self::Llm => f.write_str("llm"),
        }
    }
}

impl FromStr for ClassifierStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" | "keywords" => Ok(Self::Keyword),
            "llm" | "model" => Ok(Self::Llm),
            other => Err(format!("unknown classifier '{other}' (expected keyword or llm)")),
        }
    }
}

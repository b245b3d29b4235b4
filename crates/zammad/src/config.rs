//! Connection settings for the Zammad backend.
//!
//! Read from the environment through an injectable lookup so tests never
//! touch the process environment.

use std::fmt;
use std::time::Duration;
use ticketing_common::{Result, TicketingError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GROUP: &str = "Users";
const DEFAULT_PER_PAGE: usize = 100;

/// How requests authenticate against Zammad.
#[derive(Clone, PartialEq, Eq)]
pub enum ZammadAuth {
    /// `Authorization: Token token=<token>`
    Token(String),
    /// HTTP basic auth
    Basic { username: String, password: String },
}

impl fmt::Debug for ZammadAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(<redacted>)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZammadConfig {
    /// Instance root, e.g. `https://helpdesk.example.com` (no `/api/v1`)
    pub base_url: String,
    pub auth: ZammadAuth,
    /// Applied to every backend call
    pub timeout_secs: u64,
    /// Group new tickets are filed under
    pub default_group: String,
    /// Page size used when listing all tickets
    pub per_page: usize,
}

impl ZammadConfig {
    pub fn new(base_url: impl Into<String>, auth: ZammadAuth) -> Result<Self> {
        Ok(Self {
            base_url: normalize_base_url(&base_url.into())?,
            auth,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            default_group: DEFAULT_GROUP.to_string(),
            per_page: DEFAULT_PER_PAGE,
        })
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    /// Load from `lookup`.
    ///
    /// Requires `ZAMMAD_URL` (or `zammad_url`) and either `ZAMMAD_TOKEN` or
    /// `ZAMMAD_USERNAME` + `ZAMMAD_PASSWORD`.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| env_value(lookup, name);

        let base_url = get("ZAMMAD_URL").ok_or_else(|| {
            TicketingError::Config("environment variable ZAMMAD_URL is not set".into())
        })?;

        let auth = match (get("ZAMMAD_TOKEN"), get("ZAMMAD_USERNAME"), get("ZAMMAD_PASSWORD")) {
            (Some(token), _, _) => ZammadAuth::Token(token),
            (None, Some(username), Some(password)) => ZammadAuth::Basic { username, password },
            (None, Some(_), None) => {
                return Err(TicketingError::Config(
                    "ZAMMAD_USERNAME is set but ZAMMAD_PASSWORD is not".into(),
                ))
            }
            _ => {
                return Err(TicketingError::Config(
                    "no Zammad credentials: set ZAMMAD_TOKEN or ZAMMAD_USERNAME and ZAMMAD_PASSWORD"
                        .into(),
                ))
            }
        };

        let mut config = Self::new(base_url, auth)?;

        if let Some(raw) = get("ZAMMAD_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                TicketingError::Config(format!(
                    "ZAMMAD_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?;
            if secs == 0 {
                return Err(TicketingError::Config(
                    "ZAMMAD_TIMEOUT_SECS must be greater than zero".into(),
                ));
            }
            config.timeout_secs = secs;
        }

        if let Some(group) = get("ZAMMAD_DEFAULT_GROUP") {
            config.default_group = group;
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Absolute URL for an API path such as `tickets/12`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Value of variable `name`, or of its lower-case spelling when the
/// upper-case one is unset or blank. Values are trimmed.
pub fn env_value(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    [name.to_string(), name.to_ascii_lowercase()]
        .iter()
        .filter_map(|key| lookup(key.as_str()))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(TicketingError::Config(format!(
            "ZAMMAD_URL must start with http:// or https://, got '{raw}'"
        )));
    }
    let trimmed = trimmed.strip_suffix("/api/v1").unwrap_or(trimmed);
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_url_is_config_error() {
        let lookup = lookup_from(&[("ZAMMAD_TOKEN", "abc")]);
        let err = ZammadConfig::from_lookup(&lookup).unwrap_err();
        assert!(matches!(err, TicketingError::Config(ref m) if m.contains("ZAMMAD_URL")));
    }

    #[test]
    fn token_auth_preferred() {
        let lookup = lookup_from(&[
            ("ZAMMAD_URL", "https://desk.example.com/"),
            ("ZAMMAD_TOKEN", "abc"),
            ("ZAMMAD_USERNAME", "agent"),
            ("ZAMMAD_PASSWORD", "secret"),
        ]);
        let config = ZammadConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.base_url, "https://desk.example.com");
        assert_eq!(config.auth, ZammadAuth::Token("abc".into()));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.default_group, "Users");
    }

    #[test]
    fn lowercase_names_are_accepted() {
        let lookup = lookup_from(&[
            ("zammad_url", "http://localhost:3000/api/v1"),
            ("zammad_username", "agent"),
            ("zammad_password", "secret"),
        ]);
        let config = ZammadConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.api_url("tickets/3"), "http://localhost:3000/api/v1/tickets/3");
        assert!(matches!(config.auth, ZammadAuth::Basic { .. }));
    }

    #[test]
    fn blank_upper_case_falls_back_to_lower_case() {
        let lookup = lookup_from(&[
            ("ZAMMAD_URL", "  "),
            ("zammad_url", "http://localhost:3000"),
            ("ZAMMAD_TOKEN", "abc"),
        ]);
        let config = ZammadConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(env_value(&lookup, "ZAMMAD_TOKEN").as_deref(), Some("abc"));
        assert_eq!(env_value(&lookup, "ZAMMAD_PASSWORD"), None);
    }

    #[test]
    fn username_without_password_is_rejected() {
        let lookup = lookup_from(&[
            ("ZAMMAD_URL", "http://localhost:3000"),
            ("ZAMMAD_USERNAME", "agent"),
        ]);
        assert!(matches!(
            ZammadConfig::from_lookup(&lookup),
            Err(TicketingError::Config(ref m)) if m.contains("ZAMMAD_PASSWORD")
        ));
    }

    #[test]
    fn invalid_timeout_is_rejected() {
        let lookup = lookup_from(&[
            ("ZAMMAD_URL", "http://localhost:3000"),
            ("ZAMMAD_TOKEN", "abc"),
            ("ZAMMAD_TIMEOUT_SECS", "soon"),
        ]);
        assert!(ZammadConfig::from_lookup(&lookup).is_err());
    }

    #[test]
    fn url_without_scheme_is_rejected() {
        assert!(ZammadConfig::new("desk.example.com", ZammadAuth::Token("t".into())).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let auth = ZammadAuth::Basic {
            username: "agent".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{auth:?}");
        assert!(rendered.contains("agent"));
        assert!(!rendered.contains("hunter2"));
    }
}

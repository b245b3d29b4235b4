//! Application configuration.
//!
//! Settings come from an optional TOML file, overlaid by environment
//! variables. The environment is read through an injectable lookup so tests
//! never mutate the process environment.
//!
//! # File checks
//!
//! - Config file permission validation on Unix systems
//! - Rejects world-writable files
//! - Rejects world-readable files containing credentials
//! - Warns about credentials stored in config files

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use ticketing_agents::{ClassifierStrategy, DEFAULT_MIN_CONFIDENCE};
use ticketing_common::{Result, TicketingError};
use ticketing_llm::LlmConfig;
use ticketing_zammad::config::env_value;
use ticketing_zammad::ZammadConfig;
use tracing::warn;

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Zammad connection; anything unset here must come from the environment
    #[serde(default)]
    pub zammad: ZammadSettings,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Only used by the `llm` classifier
    #[serde(default)]
    pub llm: LlmConfig,

    /// Directory holding `*.prompt` files
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
}

/// `[zammad]` table of the config file.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ZammadSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_group: Option<String>,
}

impl fmt::Debug for ZammadSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ZammadSettings")
            .field("url", &self.url)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("timeout_secs", &self.timeout_secs)
            .field("default_group", &self.default_group)
            .finish()
    }
}

impl ZammadSettings {
    /// The file value standing in for environment variable `var`.
    fn value_for(&self, var: &str) -> Option<String> {
        match var {
            "ZAMMAD_URL" => self.url.clone(),
            "ZAMMAD_TOKEN" => self.token.clone(),
            "ZAMMAD_USERNAME" => self.username.clone(),
            "ZAMMAD_PASSWORD" => self.password.clone(),
            "ZAMMAD_TIMEOUT_SECS" => self.timeout_secs.map(|s| s.to_string()),
            "ZAMMAD_DEFAULT_GROUP" => self.default_group.clone(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub strategy: ClassifierStrategy,

    /// Labels scored below this become `unknown`
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::default(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

fn default_min_confidence() -> f32 {
    DEFAULT_MIN_CONFIDENCE
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PROMPTS_DIR)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            zammad: ZammadSettings::default(),
            classifier: ClassifierConfig::default(),
            llm: LlmConfig::default(),
            prompts_dir: default_prompts_dir(),
        }
    }
}

impl AppConfig {
    /// Optional file, then the environment overlay.
    pub fn load(path: Option<&Path>, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// On Unix systems, this validates that:
    /// - The file is a regular file
    /// - The file is not world-writable
    /// - The file is not world-readable if it contains credentials
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        #[cfg(unix)]
        validate_config_file_permissions(path)?;

        let config = Self::from_file_unchecked(path)?;

        if config.has_credentials() {
            #[cfg(unix)]
            check_secret_file_permissions(path)?;

            warn!(
                "Credentials found in config file '{}'. For better security, \
                 use environment variables instead (ZAMMAD_TOKEN, LLM_API_KEY).",
                path.display()
            );
        }

        Ok(config)
    }

    /// Load configuration from a TOML file without permission checks.
    ///
    /// Use this only for testing or when you've already validated the file.
    pub fn from_file_unchecked(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TicketingError::Config(format!("Failed to read config file '{}': {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            TicketingError::Config(format!("Invalid config file '{}': {e}", path.display()))
        })
    }

    fn has_credentials(&self) -> bool {
        self.zammad.token.is_some() || self.zammad.password.is_some() || self.llm.api_key.is_some()
    }

    /// Overlay `TICKETING_*` and `LLM_*` variables.
    pub fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(raw) = get("TICKETING_CLASSIFIER") {
            self.classifier.strategy = raw
                .parse()
                .map_err(|e| TicketingError::Config(format!("TICKETING_CLASSIFIER: {e}")))?;
        }
        if let Some(raw) = get("TICKETING_MIN_CONFIDENCE") {
            self.classifier.min_confidence = raw.parse().map_err(|_| {
                TicketingError::Config(format!(
                    "TICKETING_MIN_CONFIDENCE must be a number between 0 and 1, got '{raw}'"
                ))
            })?;
        }
        if let Some(dir) = get("TICKETING_PROMPTS_DIR") {
            self.prompts_dir = PathBuf::from(dir);
        }
        self.llm.apply_env(lookup);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.classifier.min_confidence;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(TicketingError::Config(format!(
                "classifier min_confidence must be between 0 and 1, got {threshold}"
            )));
        }
        Ok(())
    }

    /// Resolve the Zammad connection: environment first, then the file.
    ///
    /// A variable counts as set in either spelling (`ZAMMAD_URL` or
    /// `zammad_url`); a blank value counts as unset.
    pub fn zammad_config(&self, lookup: &dyn Fn(&str) -> Option<String>) -> Result<ZammadConfig> {
        let merged = |name: &str| env_value(lookup, name).or_else(|| self.zammad.value_for(name));
        ZammadConfig::from_lookup(&merged)
    }
}

/// Validate config file permissions on Unix systems.
///
/// Requirements:
/// - File must be a regular file (not symlink, directory, etc.)
/// - File must not be world-writable (mode & 0o002 == 0)
#[cfg(unix)]
fn validate_config_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::symlink_metadata(path).map_err(|e| {
        TicketingError::Config(format!("Failed to read config file '{}': {e}", path.display()))
    })?;

    if !metadata.is_file() {
        return Err(TicketingError::Config(format!(
            "Config path '{}' is not a regular file. Symlinks and directories are not allowed.",
            path.display()
        )));
    }

    let permission_bits = metadata.permissions().mode() & 0o777;
    if permission_bits & 0o002 != 0 {
        return Err(TicketingError::Config(format!(
            "Config file '{}' is world-writable (mode {permission_bits:04o}). \
             Fix with: chmod o-w {}",
            path.display(),
            path.display()
        )));
    }

    Ok(())
}

/// A file holding credentials must not be world-readable.
#[cfg(unix)]
fn check_secret_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let permission_bits = std::fs::metadata(path)?.permissions().mode() & 0o777;

    if permission_bits & 0o004 != 0 {
        return Err(TicketingError::Config(format!(
            "Config file '{}' contains credentials but is world-readable (mode {permission_bits:04o}). \
             Fix with: chmod 600 {}",
            path.display(),
            path.display()
        )));
    }

    if permission_bits & 0o040 != 0 {
        warn!(
            "Config file '{}' contains credentials and is group-readable (mode {:04o}). \
             Consider restricting access with: chmod 600 {}",
            path.display(),
            permission_bits,
            path.display()
        );
    }

    Ok(())
}

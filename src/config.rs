//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$THREADSCRIBE_CONFIG` (environment variable)
//! 2. `~/.config/threadscribe/config.toml` (Linux/macOS)
//!    `%APPDATA%\threadscribe\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags override whatever the file says.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};
use crate::source::{Criteria, Direction};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    /// Which messages to export.
    pub query: QueryConfig,
    /// Gmail API access.
    pub gmail: GmailConfig,
    /// Report output.
    pub report: ReportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Message selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// The other party's address (or a fragment of it).
    pub correspondent: Option<String>,
    pub direction: Direction,
    /// Inclusive start date, `YYYY-MM-DD`.
    pub after: Option<NaiveDate>,
    /// Exclusive end date, `YYYY-MM-DD`.
    pub before: Option<NaiveDate>,
    /// Threads requested per listing page.
    pub page_size: u32,
    /// Maximum number of messages exported.
    pub limit: Option<usize>,
}

/// Gmail API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// OAuth token cache (Google authorized-user JSON).
    pub token_path: PathBuf,
    /// Mailbox owner; `me` is the authenticated user.
    pub user_id: String,
    pub api_base: String,
    /// Retries for rate limits, server errors and transport failures.
    pub max_retries: u32,
    /// Base delay of the exponential backoff.
    pub backoff_ms: u64,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

/// Report output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Report file path.
    pub output: PathBuf,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            correspondent: None,
            direction: Direction::Either,
            after: None,
            before: None,
            page_size: 100,
            limit: None,
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            token_path: PathBuf::from("token.json"),
            user_id: "me".to_string(),
            api_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            max_retries: 5,
            backoff_ms: 500,
            timeout_secs: 30,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("emails.txt"),
        }
    }
}

impl QueryConfig {
    /// Selection criteria for a message source.
    pub fn criteria(&self) -> Criteria {
        Criteria {
            correspondent: self.correspondent.clone(),
            direction: self.direction,
            after: self.after,
            before: self.before,
            limit: self.limit,
        }
    }
}

impl Config {
    /// Reject settings that cannot produce a meaningful run.
    ///
    /// Called after command-line flags have been folded in.
    pub fn validate(&self) -> Result<()> {
        if let (Some(after), Some(before)) = (self.query.after, self.query.before) {
            if after >= before {
                return Err(ScribeError::Config(format!(
                    "empty date range: after {after} is not before {before}"
                )));
            }
        }
        if self.query.page_size == 0 {
            return Err(ScribeError::Config("query.page_size must be at least 1".into()));
        }
        if self.query.limit == Some(0) {
            return Err(ScribeError::Config("query.limit must be at least 1".into()));
        }
        if self.report.output.as_os_str().is_empty() {
            return Err(ScribeError::Config("report.output is empty".into()));
        }
        if self.gmail.user_id.trim().is_empty() {
            return Err(ScribeError::Config("gmail.user_id is empty".into()));
        }
        Ok(())
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("THREADSCRIBE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("threadscribe").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("threadscribe")
}

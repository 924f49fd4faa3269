//! Global configuration parsing, validation, and environment overrides.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::agent::policy::AgentFamily;
use crate::{AppError, Result};

fn default_cli_path() -> String {
    "claude".into()
}

fn default_approval_timeout_ms() -> u64 {
    300_000
}

fn default_max_sessions() -> usize {
    10
}

fn default_event_buffer_size() -> usize {
    500
}

fn default_agent_family() -> AgentFamily {
    AgentFamily::Claude
}

/// Global configuration parsed from `warden.toml`.
///
/// All four process-wide settings are bound once at startup and shared
/// immutably by the session manager. Environment variables with the
/// `WARDEN_` prefix override file values (see [`WardenConfig::apply_env`]).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct WardenConfig {
    /// Path or name of the agent CLI binary.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
    /// Agent family selecting the spawn policy.
    #[serde(default = "default_agent_family")]
    pub agent_family: AgentFamily,
    /// Milliseconds before a pending approval is auto-denied.
    #[serde(default = "default_approval_timeout_ms")]
    pub approval_timeout_ms: u64,
    /// Maximum number of sessions with a live process.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Per-session event ring-buffer capacity.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            agent_family: default_agent_family(),
            approval_timeout_ms: default_approval_timeout_ms(),
            max_sessions: default_max_sessions(),
            event_buffer_size: default_event_buffer_size(),
        }
    }
}

impl WardenConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// A missing file yields the defaults; env overrides still apply.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file exists but cannot be read,
    /// contains invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
            toml::from_str(&raw)?
        } else {
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// Environment overrides are applied only by [`Self::load_from_path`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `WARDEN_*` environment variable overrides.
    ///
    /// Unparseable numeric values are ignored in favor of the file value.
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("WARDEN_CLI_PATH") {
            if !v.is_empty() {
                self.cli_path = v;
            }
        }
        if let Ok(v) = env::var("WARDEN_AGENT_FAMILY") {
            match v.to_ascii_lowercase().as_str() {
                "claude" => self.agent_family = AgentFamily::Claude,
                "codex" => self.agent_family = AgentFamily::Codex,
                _ => {}
            }
        }
        if let Some(v) = parse_env("WARDEN_APPROVAL_TIMEOUT_MS") {
            self.approval_timeout_ms = v;
        }
        if let Some(v) = parse_env("WARDEN_MAX_SESSIONS") {
            self.max_sessions = v as usize;
        }
        if let Some(v) = parse_env("WARDEN_EVENT_BUFFER_SIZE") {
            self.event_buffer_size = v as usize;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.cli_path.is_empty() {
            return Err(AppError::Config("cli_path must not be empty".into()));
        }
        if self.max_sessions == 0 {
            return Err(AppError::Config(
                "max_sessions must be greater than zero".into(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(AppError::Config(
                "event_buffer_size must be greater than zero".into(),
            ));
        }
        if self.approval_timeout_ms == 0 {
            return Err(AppError::Config(
                "approval_timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

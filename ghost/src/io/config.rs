//! Ghost configuration loaded from an optional TOML file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CONFIG_ENV: &str = "GHOST_CONFIG";
pub const BASE_URL_ENV: &str = "GHOST_BASE_URL";
pub const MODEL_ENV: &str = "GHOST_MODEL";

/// Ghost configuration (TOML).
///
/// Missing fields default to the values the CLI ships with, so an empty or partial file
/// is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GhostConfig {
    /// Chat model identifier sent with every completion.
    pub model: String,

    /// Root of the OpenAI-compatible API (`/chat/completions` is appended).
    pub base_url: String,

    pub temperature: f64,

    /// HTTP timeout for a single completion call.
    pub request_timeout_secs: u64,

    /// Wall-clock bound for ordinary command steps.
    pub command_timeout_secs: u64,

    /// Keep at most this many bytes of each output stream per command.
    pub output_limit_bytes: usize,

    /// Loop iteration cap.
    pub max_commands: usize,

    /// Ask for an alternative after a failed command.
    pub retry: bool,

    pub tokens: TokenBudgets,
}

/// Output token ceilings per call type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenBudgets {
    pub command: u32,
    pub continuation: u32,
    pub explanation: u32,
    pub explanation_verbose: u32,
    pub file_content: u32,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            command: 150,
            continuation: 50,
            explanation: 150,
            explanation_verbose: 400,
            file_content: 2000,
        }
    }
}

impl Default for GhostConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.3,
            request_timeout_secs: 60,
            command_timeout_secs: 30,
            output_limit_bytes: 1_000_000,
            max_commands: 5,
            retry: true,
            tokens: TokenBudgets::default(),
        }
    }
}

impl GhostConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must be non-empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("base_url must be non-empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("temperature must be within 0..=2"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.max_commands == 0 {
            return Err(anyhow!("max_commands must be > 0"));
        }
        let t = &self.tokens;
        if [
            t.command,
            t.continuation,
            t.explanation,
            t.explanation_verbose,
            t.file_content,
        ]
        .contains(&0)
        {
            return Err(anyhow!("tokens.* budgets must be > 0"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Apply `GHOST_BASE_URL` / `GHOST_MODEL` when set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            debug!(%base_url, "base_url overridden from environment");
            self.base_url = base_url;
        }
        if let Some(model) = non_empty(MODEL_ENV) {
            debug!(%model, "model overridden from environment");
            self.model = model;
        }
    }
}

/// Resolve the config path: explicit flag first, then `GHOST_CONFIG`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var_os(CONFIG_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    })
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GhostConfig::default()`.
pub fn load_config(path: &Path) -> Result<GhostConfig> {
    if !path.exists() {
        let cfg = GhostConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GhostConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

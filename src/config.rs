use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// How a recorded failure interacts with later successes in the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The failure marker stays up until a job triggered *after* the failure
    /// succeeds.
    #[default]
    Sticky,
    /// Whichever job settles last decides the indicator.
    LastSettledWins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Summarizer argv; the prompt is appended as the final argument.
    pub summarizer: Vec<String>,
    /// Separate argv for session naming. Falls back to `summarizer`.
    pub session_summarizer: Option<Vec<String>>,
    /// Hard bound on a single summarizer invocation.
    pub timeout_secs: u64,
    /// Proposed names longer than this are rejected, not truncated.
    pub max_name_len: usize,
    /// tmux user option carrying the status indicator. Rendered with e.g.
    /// `status-right '#{?@organize_status,[#{@organize_status}] ,}...'`
    pub status_option: String,
    pub failure_policy: FailurePolicy,
    /// Reuse summarizer results for unchanged context.
    pub cache: bool,
    pub cache_dir: Option<PathBuf>,
    /// Optional command emitting agent-session JSON used to enrich captures.
    pub enrichment_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            summarizer: argv(&["opencode", "run", "-m", "anthropic/claude-haiku-4-5"]),
            session_summarizer: Some(argv(&["opencode", "run", "-m", "anthropic/claude-sonnet-4-5"])),
            timeout_secs: 120,
            max_name_len: 60,
            status_option: "@organize_status".to_string(),
            failure_policy: FailurePolicy::Sticky,
            cache: true,
            cache_dir: None,
            enrichment_command: None,
        }
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file is absent. A malformed file is an error, surfaced before any
    /// job starts.
    pub fn load() -> Result<Self> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(Self::default());
        };
        let path = dir.join("tmux-organize").join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_path(&path)
    }

    pub fn load_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&data)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.summarizer.is_empty() {
            anyhow::bail!("summarizer command must not be empty");
        }
        if matches!(&self.session_summarizer, Some(argv) if argv.is_empty()) {
            anyhow::bail!("session_summarizer command must not be empty");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be positive");
        }
        if self.max_name_len == 0 {
            anyhow::bail!("max_name_len must be positive");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured cache directory, or `~/.cache/tmux-organize`.
    pub fn cache_location(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("tmux-organize")
        })
    }
}

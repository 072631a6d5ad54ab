use std::process::Stdio;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::debug;

use crate::config::Config;
use crate::error::InvocationError;

/// Which flavor of name is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Window,
    Session,
}

/// Launches the external summarizer off the interactive critical path.
#[derive(Debug, Clone)]
pub struct Namer {
    window_command: Vec<String>,
    session_command: Vec<String>,
    timeout: Duration,
    max_name_len: usize,
}

/// Handle to a summarizer running as a background task. The sub-process
/// lifetime is bounded by the timeout regardless of who awaits.
pub struct NamerHandle {
    task: JoinHandle<Result<String, InvocationError>>,
}

impl NamerHandle {
    pub async fn wait(self) -> Result<String, InvocationError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(InvocationError::ProcessFailed {
                code: None,
                stderr: format!("summarizer task died: {e}"),
            }),
        }
    }
}

impl Namer {
    pub fn new(config: &Config) -> Self {
        Self {
            window_command: config.summarizer.clone(),
            session_command: config
                .session_summarizer
                .clone()
                .unwrap_or_else(|| config.summarizer.clone()),
            timeout: config.timeout(),
            max_name_len: config.max_name_len,
        }
    }

    /// Start the summarizer; returns immediately with a handle to await.
    pub fn spawn(&self, kind: NameKind, context: &str) -> NamerHandle {
        let argv = match kind {
            NameKind::Window => self.window_command.clone(),
            NameKind::Session => self.session_command.clone(),
        };
        let prompt = build_prompt(kind, context);
        let limit = self.timeout;
        let max_len = self.max_name_len;
        let task = tokio::spawn(async move { invoke(argv, prompt, limit, max_len).await });
        NamerHandle { task }
    }
}

async fn invoke(
    argv: Vec<String>,
    prompt: String,
    limit: Duration,
    max_len: usize,
) -> Result<String, InvocationError> {
    let Some((program, args)) = argv.split_first() else {
        return Err(InvocationError::ProcessFailed {
            code: None,
            stderr: "empty summarizer command".to_string(),
        });
    };

    debug!(program = %program, "invoking summarizer");
    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(&prompt)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| InvocationError::ProcessFailed {
        code: None,
        stderr: e.to_string(),
    })?;

    // On expiry the output future is dropped and kill_on_drop reaps the
    // child; a late answer can never be applied.
    let output = match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(InvocationError::ProcessFailed {
                code: None,
                stderr: e.to_string(),
            })
        }
        Err(_) => return Err(InvocationError::Timeout { after: limit }),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InvocationError::ProcessFailed {
            code: output.status.code(),
            stderr: stderr_tail(&stderr),
        });
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    validate_name(&raw, max_len)
}

pub(crate) fn build_prompt(kind: NameKind, context: &str) -> String {
    match kind {
        NameKind::Window => format!(
            "here is context about a tmux window: {context} -- \
             generate a short lowercase-hyphenated name for this window \
             (2-4 words max). describe what the user is working on, not \
             the tools or hostname. output ONLY the slug, nothing else."
        ),
        NameKind::Session => format!(
            "here is the state of a tmux session:\n\n{context}\n\
             name this session: a short lowercase project name derived from \
             the working directory or dominant codebase. describe the \
             project, not tools or hostnames. output ONLY the name, \
             nothing else."
        ),
    }
}

/// Control characters, including newlines; tmux names are single-line.
static RE_CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\x00-\x1f\x7f]+").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"  +").unwrap());

/// Strip control characters and newlines, collapse whitespace runs, trim.
pub fn sanitize_name(raw: &str) -> String {
    let no_control = RE_CONTROL.replace_all(raw, " ");
    RE_SPACES.replace_all(no_control.trim(), " ").to_string()
}

/// Sanitized name, or `InvalidOutput` when empty or over the length bound.
pub fn validate_name(raw: &str, max_len: usize) -> Result<String, InvocationError> {
    let name = sanitize_name(raw);
    if name.is_empty() {
        return Err(InvocationError::InvalidOutput(
            "empty or whitespace-only name".to_string(),
        ));
    }
    if name.chars().count() > max_len {
        return Err(InvocationError::InvalidOutput(format!(
            "name exceeds {max_len} chars"
        )));
    }
    Ok(name)
}

/// Last few stderr lines, for error reporting.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().rev().take(3).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join("\n")
}

use std::time::Duration;

use thiserror::Error;

/// Failures while reading target identity or pane context from tmux.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The window or session vanished between trigger and capture.
    #[error("target no longer exists")]
    TargetGone,
    /// The tmux CLI itself could not be queried.
    #[error("tmux unreachable: {0}")]
    HostUnreachable(anyhow::Error),
}

/// Failures of the summarizer sub-process.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("summarizer timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("summarizer exited with {code:?}: {stderr}")]
    ProcessFailed { code: Option<i32>, stderr: String },
    /// Empty, whitespace-only, or over-long output. Never applied verbatim.
    #[error("summarizer produced unusable output: {0}")]
    InvalidOutput(String),
}

/// Failures while writing a name back to tmux.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("target no longer exists")]
    TargetGone,
    /// A newer job for the same target won; expected control flow, not a
    /// user-visible failure.
    #[error("superseded by a newer naming job")]
    Superseded,
}

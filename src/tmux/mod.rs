mod client;

pub use client::TmuxClient;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// tmux session id as reported by the server (e.g. "$3").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

/// tmux window id (e.g. "@12").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The entity a naming job acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Window { session: SessionId, window: WindowId },
    Session { session: SessionId },
}

impl Target {
    /// The session whose status scope this target belongs to.
    pub fn session(&self) -> &SessionId {
        match self {
            Target::Window { session, .. } | Target::Session { session } => session,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Window { session, window } => {
                write!(f, "window {window} in session {session}")
            }
            Target::Session { session } => write!(f, "session {session}"),
        }
    }
}

/// One pane's context as reported by list-panes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaneInfo {
    pub title: String,
    /// Current command name (e.g. "zsh").
    pub command: String,
    /// Absolute working directory.
    pub path: String,
    /// The pane's shell pid.
    pub pid: String,
    /// Full argv of the shell's first child (e.g. "nvim README.md"),
    /// empty when the shell has no children.
    pub cmdline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    pub index: usize,
    pub name: String,
    pub panes: Vec<PaneInfo>,
}

/// Everything about one session: windows, panes, path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub name: String,
    pub path: String,
    pub windows: Vec<WindowInfo>,
}

/// Identity of the focused window and its session at trigger time.
#[derive(Debug, Clone)]
pub struct CurrentTarget {
    pub session: SessionId,
    pub session_name: String,
    pub window: WindowId,
    pub window_index: usize,
}

/// Backend-agnostic interface to the host multiplexer. `Ok(None)` from the
/// lookup methods means the target does not exist; `Err` means the host
/// itself could not be reached.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Identity of the active window/session, or None outside tmux.
    async fn current_target(&self) -> Result<Option<CurrentTarget>>;

    async fn window_info(&self, window: &WindowId) -> Result<Option<WindowInfo>>;

    async fn session_snapshot(&self, session: &SessionId) -> Result<Option<SessionSnapshot>>;

    async fn window_exists(&self, window: &WindowId) -> Result<bool>;

    async fn session_exists(&self, session: &SessionId) -> Result<bool>;

    async fn rename_window(&self, window: &WindowId, name: &str) -> Result<()>;

    async fn rename_session(&self, session: &SessionId, name: &str) -> Result<()>;

    /// Set a session-scoped user option (e.g. "@organize_status").
    async fn set_option(&self, session: &SessionId, option: &str, value: &str) -> Result<()>;

    async fn unset_option(&self, session: &SessionId, option: &str) -> Result<()>;
}

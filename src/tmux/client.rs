use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::{
    CurrentTarget, Multiplexer, PaneInfo, SessionId, SessionSnapshot, WindowId, WindowInfo,
};

const PANE_FORMAT: &str = "#{pane_title}\t#{pane_current_command}\t#{pane_current_path}\t#{pane_pid}";
const WINDOW_FORMAT: &str = "#{window_id}\t#{window_index}\t#{window_name}";

/// Client for interacting with tmux via CLI
#[derive(Debug, Clone)]
pub struct TmuxClient {
    /// Path to tmux binary
    tmux_path: String,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self {
            tmux_path: "tmux".to_string(),
        }
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output> {
        Command::new(&self.tmux_path)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute tmux {}", args.first().unwrap_or(&"")))
    }

    /// Run a tmux command whose failure is a hard error.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "tmux {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            );
        }
        Ok(strip_trailing_newlines(&output.stdout))
    }

    /// Run a tmux query, mapping "target does not exist" to None. Other
    /// failures (no binary, server crash) stay errors.
    async fn query(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.output(args).await?;
        if output.status.success() {
            return Ok(Some(strip_trailing_newlines(&output.stdout)));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("can't find")
            || stderr.contains("no server running")
            || stderr.contains("no current client")
        {
            return Ok(None);
        }
        anyhow::bail!(
            "tmux {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        );
    }

    async fn panes_of(&self, target: &str) -> Result<Vec<PaneInfo>> {
        let Some(raw) = self.query(&["list-panes", "-t", target, "-F", PANE_FORMAT]).await? else {
            return Ok(Vec::new());
        };

        let mut panes = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                continue;
            }
            let cmdline = child_cmdline(fields[3]).await;
            panes.push(PaneInfo {
                title: fields[0].to_string(),
                command: fields[1].to_string(),
                path: fields[2].to_string(),
                pid: fields[3].to_string(),
                cmdline,
            });
        }
        Ok(panes)
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Multiplexer for TmuxClient {
    async fn current_target(&self) -> Result<Option<CurrentTarget>> {
        let Some(line) = self
            .query(&[
                "display-message",
                "-p",
                "#{session_id}\t#{session_name}\t#{window_id}\t#{window_index}",
            ])
            .await?
        else {
            return Ok(None);
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 4 || fields[0].is_empty() || fields[2].is_empty() {
            return Ok(None);
        }
        let window_index = fields[3].parse().unwrap_or(0);
        Ok(Some(CurrentTarget {
            session: SessionId(fields[0].to_string()),
            session_name: fields[1].to_string(),
            window: WindowId(fields[2].to_string()),
            window_index,
        }))
    }

    async fn window_info(&self, window: &WindowId) -> Result<Option<WindowInfo>> {
        let Some(meta) = self
            .query(&[
                "display-message",
                "-t",
                window.0.as_str(),
                "-p",
                "#{window_index}\t#{window_name}",
            ])
            .await?
        else {
            return Ok(None);
        };

        let (index, name) = match meta.split_once('\t') {
            Some((index, name)) => (index.parse().unwrap_or(0), name.to_string()),
            None => (0, meta),
        };
        let panes = self.panes_of(window.0.as_str()).await?;
        Ok(Some(WindowInfo {
            id: window.clone(),
            index,
            name,
            panes,
        }))
    }

    async fn session_snapshot(&self, session: &SessionId) -> Result<Option<SessionSnapshot>> {
        let Some(meta) = self
            .query(&[
                "display-message",
                "-t",
                session.0.as_str(),
                "-p",
                "#{session_name}\t#{pane_current_path}",
            ])
            .await?
        else {
            return Ok(None);
        };
        let (name, path) = match meta.split_once('\t') {
            Some((name, path)) => (name.to_string(), path.to_string()),
            None => (meta, String::new()),
        };

        let Some(raw_windows) = self
            .query(&["list-windows", "-t", session.0.as_str(), "-F", WINDOW_FORMAT])
            .await?
        else {
            return Ok(None);
        };

        let mut windows = Vec::new();
        for line in raw_windows.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                continue;
            }
            let id = WindowId(fields[0].to_string());
            let panes = self.panes_of(fields[0]).await?;
            windows.push(WindowInfo {
                id,
                index: fields[1].parse().unwrap_or(0),
                name: fields[2].to_string(),
                panes,
            });
        }

        Ok(Some(SessionSnapshot {
            id: session.clone(),
            name,
            path,
            windows,
        }))
    }

    async fn window_exists(&self, window: &WindowId) -> Result<bool> {
        Ok(self
            .query(&["display-message", "-t", window.0.as_str(), "-p", "#{window_id}"])
            .await?
            .is_some())
    }

    async fn session_exists(&self, session: &SessionId) -> Result<bool> {
        Ok(self
            .query(&["display-message", "-t", session.0.as_str(), "-p", "#{session_id}"])
            .await?
            .is_some())
    }

    async fn rename_window(&self, window: &WindowId, name: &str) -> Result<()> {
        self.run(&["rename-window", "-t", window.0.as_str(), name])
            .await?;
        Ok(())
    }

    async fn rename_session(&self, session: &SessionId, name: &str) -> Result<()> {
        self.run(&["rename-session", "-t", session.0.as_str(), name])
            .await?;
        Ok(())
    }

    async fn set_option(&self, session: &SessionId, option: &str, value: &str) -> Result<()> {
        self.run(&["set-option", "-t", session.0.as_str(), option, value])
            .await?;
        Ok(())
    }

    async fn unset_option(&self, session: &SessionId, option: &str) -> Result<()> {
        self.run(&["set-option", "-t", session.0.as_str(), "-u", option])
            .await?;
        Ok(())
    }
}

/// Strip trailing newlines only. A full trim would eat leading tabs, which
/// breaks tab-delimited format strings when a field like pane_title is empty.
fn strip_trailing_newlines(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .trim_end_matches('\n')
        .to_string()
}

/// Full command line of the first child of a shell pid (e.g. "nvim README.md"),
/// or empty string if no child is found.
pub async fn child_cmdline(shell_pid: &str) -> String {
    let Ok(output) = Command::new("pgrep").args(["-lP", shell_pid]).output().await else {
        return String::new();
    };
    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(first_child) = stdout.lines().find(|line| !line.trim().is_empty()) else {
        return String::new();
    };
    let Some(child_pid) = first_child.split_whitespace().next() else {
        return String::new();
    };
    let Ok(args) = Command::new("ps")
        .args(["-p", child_pid, "-o", "args="])
        .output()
        .await
    else {
        return String::new();
    };
    String::from_utf8_lossy(&args.stdout).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_newlines_stripped_leading_tabs_kept() {
        assert_eq!(strip_trailing_newlines(b"\tzsh\t/home\n\n"), "\tzsh\t/home");
        assert_eq!(strip_trailing_newlines(b"plain\n"), "plain");
        assert_eq!(strip_trailing_newlines(b""), "");
    }

    #[tokio::test]
    async fn child_cmdline_of_bogus_pid_is_empty() {
        // far beyond pid_max, so nothing can have it as a parent
        assert_eq!(child_cmdline("99999999").await, "");
    }
}

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::error::CaptureError;
use crate::tmux::{CurrentTarget, Multiplexer, SessionSnapshot, Target, WindowInfo};

const ENRICHMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hostname variants for filtering non-descriptive pane titles.
static HOSTNAME_TITLES: Lazy<Vec<String>> = Lazy::new(|| {
    let full = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();
    let short = full.split('.').next().unwrap_or_default().to_string();
    let mut titles = vec![full, short];
    titles.retain(|t| !t.is_empty());
    titles.dedup();
    titles
});

/// Immutable snapshot of everything the summarizer gets to see.
#[derive(Debug, Clone)]
pub struct CapturedContext {
    pub target: Target,
    pub text: String,
    pub captured_at: Instant,
}

/// Collect pane context for the focused window: process cmdlines, unique
/// paths, filtered titles, and the current name.
pub async fn capture_window(
    mux: &dyn Multiplexer,
    current: &CurrentTarget,
    enrichment: Option<&[String]>,
) -> Result<CapturedContext, CaptureError> {
    let info = mux
        .window_info(&current.window)
        .await
        .map_err(CaptureError::HostUnreachable)?
        .ok_or(CaptureError::TargetGone)?;

    let mut text = render_window_context(&info, &HOSTNAME_TITLES);
    if let Some(argv) = enrichment {
        if let Some(title) =
            window_enrichment_title(argv, &current.session_name, current.window_index).await
        {
            if !text.is_empty() {
                text.push_str("; ");
            }
            text.push_str(&format!("agent session title: {title}"));
        }
    }

    Ok(CapturedContext {
        target: Target::Window {
            session: current.session.clone(),
            window: current.window.clone(),
        },
        text,
        captured_at: Instant::now(),
    })
}

/// Collect all window and pane info for the focused session. Process
/// cmdlines and paths are the primary signals; pane titles are
/// supplementary since they are inconsistent.
pub async fn capture_session(
    mux: &dyn Multiplexer,
    current: &CurrentTarget,
    enrichment: Option<&[String]>,
) -> Result<CapturedContext, CaptureError> {
    let snapshot = mux
        .session_snapshot(&current.session)
        .await
        .map_err(CaptureError::HostUnreachable)?
        .ok_or(CaptureError::TargetGone)?;

    let mut text = render_session_context(&snapshot, &HOSTNAME_TITLES);
    if let Some(argv) = enrichment {
        let lines = session_enrichment_lines(argv, &current.session_name).await;
        if !lines.is_empty() {
            text.push_str("agent sessions:\n");
            for line in lines {
                text.push_str(&line);
                text.push('\n');
            }
        }
    }

    Ok(CapturedContext {
        target: Target::Session {
            session: current.session.clone(),
        },
        text,
        captured_at: Instant::now(),
    })
}

fn render_window_context(info: &WindowInfo, hostnames: &[String]) -> String {
    let cmdlines: Vec<&str> = info
        .panes
        .iter()
        .map(|p| p.cmdline.as_str())
        .filter(|c| !c.is_empty())
        .collect();

    let mut paths: Vec<&str> = info
        .panes
        .iter()
        .map(|p| p.path.as_str())
        .filter(|p| !p.is_empty())
        .collect();
    paths.sort_unstable();
    paths.dedup();

    let mut titles = filter_titles(info.panes.iter().map(|p| p.title.as_str()), hostnames);
    titles.sort_unstable();
    titles.dedup();

    let mut parts = Vec::new();
    if !cmdlines.is_empty() {
        parts.push(format!("processes: {}", cmdlines.join("; ")));
    }
    if !paths.is_empty() {
        parts.push(format!("paths: {}", paths.join("; ")));
    }
    if !titles.is_empty() {
        parts.push(format!("titles: {}", titles.join("; ")));
    }
    if !info.name.is_empty() {
        parts.push(format!("current name: {}", info.name));
    }
    parts.join("; ")
}

fn render_session_context(snapshot: &SessionSnapshot, hostnames: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("session path: {}\n", snapshot.path));
    out.push_str(&format!("current name: {}\n", snapshot.name));
    out.push_str("windows:\n");
    for window in &snapshot.windows {
        out.push_str(&format!(
            "  {} index={} name=\"{}\":\n",
            window.id, window.index, window.name
        ));
        for pane in &window.panes {
            let process = if pane.cmdline.is_empty() {
                pane.command.as_str()
            } else {
                pane.cmdline.as_str()
            };
            out.push_str(&format!("    - process: {} | pwd: {}", process, pane.path));
            let title = pane.title.trim();
            if !title.is_empty() && !hostnames.iter().any(|h| h == title) {
                out.push_str(&format!(" | title: {title}"));
            }
            out.push('\n');
        }
    }
    out
}

fn filter_titles<'a>(
    titles: impl Iterator<Item = &'a str>,
    hostnames: &[String],
) -> Vec<&'a str> {
    titles
        .map(str::trim)
        .filter(|t| !t.is_empty() && !hostnames.iter().any(|h| h == t))
        .collect()
}

// -- agent-session enrichment --

#[derive(Debug, Deserialize)]
struct EnrichmentRecord {
    #[serde(default)]
    tmux_pane: String,
    #[serde(default)]
    session: Option<AgentSession>,
}

#[derive(Debug, Deserialize)]
struct AgentSession {
    #[serde(default)]
    title: String,
    #[serde(default = "unknown")]
    status: String,
    #[serde(default)]
    message_count: u64,
    #[serde(default = "unknown")]
    model: String,
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Run the configured enrichment command and parse its JSON output. Any
/// failure (missing binary, timeout, non-zero exit, bad JSON) degrades to
/// no enrichment, never to an error.
async fn run_enrichment(argv: &[String]) -> Vec<EnrichmentRecord> {
    let Some((program, args)) = argv.split_first() else {
        return Vec::new();
    };
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!("enrichment command unavailable: {e}");
            return Vec::new();
        }
    };
    let output = match timeout(ENRICHMENT_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("enrichment command failed: {e}");
            return Vec::new();
        }
        Err(_) => {
            debug!("enrichment command timed out");
            return Vec::new();
        }
    };
    if !output.status.success() {
        debug!("enrichment command exited with {:?}", output.status.code());
        return Vec::new();
    }
    match serde_json::from_slice(&output.stdout) {
        Ok(records) => records,
        Err(e) => {
            debug!("enrichment output was not valid JSON: {e}");
            Vec::new()
        }
    }
}

/// Parse a "session_name:window_index.pane_index" pane target and return
/// the window index when it belongs to `session_name`.
fn pane_window_index(pane_target: &str, session_name: &str) -> Option<usize> {
    let (session, rest) = pane_target.split_once(':')?;
    if session != session_name {
        return None;
    }
    rest.split('.').next()?.parse().ok()
}

async fn window_enrichment_title(
    argv: &[String],
    session_name: &str,
    window_index: usize,
) -> Option<String> {
    run_enrichment(argv).await.into_iter().find_map(|record| {
        let index = pane_window_index(&record.tmux_pane, session_name)?;
        if index != window_index {
            return None;
        }
        let title = record.session?.title;
        (!title.is_empty()).then_some(title)
    })
}

async fn session_enrichment_lines(argv: &[String], session_name: &str) -> Vec<String> {
    let mut by_index: BTreeMap<usize, AgentSession> = BTreeMap::new();
    for record in run_enrichment(argv).await {
        let Some(index) = pane_window_index(&record.tmux_pane, session_name) else {
            continue;
        };
        let Some(session) = record.session else {
            continue;
        };
        if session.title.is_empty() {
            continue;
        }
        by_index.entry(index).or_insert(session);
    }
    by_index
        .into_iter()
        .map(|(index, s)| {
            format!(
                "window {index} has agent session: \"{}\" ({}, {} messages, model: {})",
                s.title, s.status, s.message_count, s.model
            )
        })
        .collect()
}

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{
    CurrentTarget, Multiplexer, PaneInfo, SessionId, SessionSnapshot, WindowId, WindowInfo,
};

/// In-memory multiplexer for tests. Every name and option write is recorded.
pub struct FakeMux {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    current: Option<CurrentTarget>,
    windows: HashMap<WindowId, WindowInfo>,
    sessions: HashMap<SessionId, FakeSession>,
    options: HashMap<(SessionId, String), String>,
    /// Chronological status-option writes: Some(value) for set, None for unset.
    option_writes: Vec<Option<String>>,
    renames: Vec<(String, String)>,
}

#[derive(Default, Clone)]
struct FakeSession {
    name: String,
    path: String,
    windows: Vec<WindowId>,
}

impl FakeMux {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    /// One session ("$1") with one focused window ("@1") running an editor.
    pub fn single_window(session_name: &str, window_name: &str) -> (Self, CurrentTarget) {
        let session = SessionId("$1".to_string());
        let window = WindowId("@1".to_string());
        let info = WindowInfo {
            id: window.clone(),
            index: 1,
            name: window_name.to_string(),
            panes: vec![PaneInfo {
                title: String::new(),
                command: "zsh".to_string(),
                path: "/home/dev/project".to_string(),
                pid: "100".to_string(),
                cmdline: "nvim README.md".to_string(),
            }],
        };
        let current = CurrentTarget {
            session: session.clone(),
            session_name: session_name.to_string(),
            window: window.clone(),
            window_index: 1,
        };

        let fake = Self::new();
        {
            let mut state = fake.lock();
            state.windows.insert(window.clone(), info);
            state.sessions.insert(
                session,
                FakeSession {
                    name: session_name.to_string(),
                    path: "/home/dev/project".to_string(),
                    windows: vec![window],
                },
            );
            state.current = Some(current.clone());
        }
        (fake, current)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn window_name(&self, window: &WindowId) -> Option<String> {
        self.lock().windows.get(window).map(|w| w.name.clone())
    }

    pub fn session_name(&self, session: &SessionId) -> Option<String> {
        self.lock().sessions.get(session).map(|s| s.name.clone())
    }

    pub fn option(&self, session: &SessionId, option: &str) -> Option<String> {
        self.lock()
            .options
            .get(&(session.clone(), option.to_string()))
            .cloned()
    }

    pub fn option_writes(&self) -> Vec<Option<String>> {
        self.lock().option_writes.clone()
    }

    pub fn rename_count(&self) -> usize {
        self.lock().renames.len()
    }

    pub fn remove_window(&self, window: &WindowId) {
        self.lock().windows.remove(window);
    }

    /// Simulates the user unsetting the option by hand.
    pub fn clear_option(&self, session: &SessionId, option: &str) {
        self.lock()
            .options
            .remove(&(session.clone(), option.to_string()));
    }
}

#[async_trait]
impl Multiplexer for FakeMux {
    async fn current_target(&self) -> Result<Option<CurrentTarget>> {
        Ok(self.lock().current.clone())
    }

    async fn window_info(&self, window: &WindowId) -> Result<Option<WindowInfo>> {
        Ok(self.lock().windows.get(window).cloned())
    }

    async fn session_snapshot(&self, session: &SessionId) -> Result<Option<SessionSnapshot>> {
        let state = self.lock();
        let Some(fake_session) = state.sessions.get(session) else {
            return Ok(None);
        };
        let windows = fake_session
            .windows
            .iter()
            .filter_map(|id| state.windows.get(id).cloned())
            .collect();
        Ok(Some(SessionSnapshot {
            id: session.clone(),
            name: fake_session.name.clone(),
            path: fake_session.path.clone(),
            windows,
        }))
    }

    async fn window_exists(&self, window: &WindowId) -> Result<bool> {
        Ok(self.lock().windows.contains_key(window))
    }

    async fn session_exists(&self, session: &SessionId) -> Result<bool> {
        Ok(self.lock().sessions.contains_key(session))
    }

    async fn rename_window(&self, window: &WindowId, name: &str) -> Result<()> {
        let mut state = self.lock();
        if let Some(info) = state.windows.get_mut(window) {
            info.name = name.to_string();
        }
        state.renames.push((window.0.clone(), name.to_string()));
        Ok(())
    }

    async fn rename_session(&self, session: &SessionId, name: &str) -> Result<()> {
        let mut state = self.lock();
        if let Some(fake_session) = state.sessions.get_mut(session) {
            fake_session.name = name.to_string();
        }
        state.renames.push((session.0.clone(), name.to_string()));
        Ok(())
    }

    async fn set_option(&self, session: &SessionId, option: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .options
            .insert((session.clone(), option.to_string()), value.to_string());
        state.option_writes.push(Some(value.to_string()));
        Ok(())
    }

    async fn unset_option(&self, session: &SessionId, option: &str) -> Result<()> {
        let mut state = self.lock();
        state.options.remove(&(session.clone(), option.to_string()));
        state.option_writes.push(None);
        Ok(())
    }
}

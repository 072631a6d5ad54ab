use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use crate::capture::CapturedContext;
use crate::tmux::Target;

/// Lifecycle of one naming attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    /// A newer job for the same target started first; this job's result is
    /// discarded even if it later succeeds.
    Superseded,
}

/// One asynchronous naming attempt, trigger to settle.
#[derive(Debug)]
pub struct NamingJob {
    pub id: u64,
    pub target: Target,
    /// Supersession stamp: valid only while it matches the registry's
    /// current generation for the target.
    pub generation: u64,
    pub context: CapturedContext,
    pub status: JobStatus,
    pub started_at: Instant,
}

/// Tracks the newest generation per target. Last trigger wins: beginning a
/// job supersedes any in-flight job for the same target, never queues.
#[derive(Debug, Default)]
pub struct JobRegistry {
    inner: Mutex<RegistryState>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_job_id: u64,
    generations: HashMap<Target, u64>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh generation for `target`. Returns (job id, generation).
    pub fn begin(&self, target: &Target) -> (u64, u64) {
        let mut inner = self.lock();
        inner.next_job_id += 1;
        let id = inner.next_job_id;
        let generation = inner.generations.entry(target.clone()).or_insert(0);
        *generation += 1;
        (id, *generation)
    }

    /// True while `generation` is still the newest for `target`.
    pub fn is_current(&self, target: &Target, generation: u64) -> bool {
        self.lock().generations.get(target).copied() == Some(generation)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::{SessionId, WindowId};

    fn window_target() -> Target {
        Target::Window {
            session: SessionId("$1".to_string()),
            window: WindowId("@1".to_string()),
        }
    }

    #[test]
    fn a_new_trigger_supersedes_the_old_generation() {
        let registry = JobRegistry::new();
        let target = window_target();

        let (first_id, first_gen) = registry.begin(&target);
        assert!(registry.is_current(&target, first_gen));

        let (second_id, second_gen) = registry.begin(&target);
        assert_ne!(first_id, second_id);
        assert!(!registry.is_current(&target, first_gen));
        assert!(registry.is_current(&target, second_gen));
    }

    #[test]
    fn targets_supersede_independently() {
        let registry = JobRegistry::new();
        let window = window_target();
        let session = Target::Session {
            session: SessionId("$1".to_string()),
        };

        let (_, window_gen) = registry.begin(&window);
        let (_, session_gen) = registry.begin(&session);
        registry.begin(&session);

        assert!(registry.is_current(&window, window_gen));
        assert!(!registry.is_current(&session, session_gen));
    }
}

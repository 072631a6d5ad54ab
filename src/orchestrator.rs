use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::apply::apply_name;
use crate::cache::NameCache;
use crate::capture::{self, CapturedContext};
use crate::config::Config;
use crate::error::{ApplyError, CaptureError};
use crate::job::{JobRegistry, JobStatus, NamingJob};
use crate::namer::{NameKind, Namer};
use crate::status::StatusBoard;
use crate::tmux::{CurrentTarget, Multiplexer, Target};

/// Sequences capture, invocation, and apply for every naming job, and owns
/// the shared supersession and status state.
#[derive(Clone)]
pub struct Orchestrator {
    mux: Arc<dyn Multiplexer>,
    namer: Namer,
    status: Arc<StatusBoard>,
    registry: Arc<JobRegistry>,
    cache: Arc<NameCache>,
    config: Config,
}

impl Orchestrator {
    pub fn new(mux: Arc<dyn Multiplexer>, config: Config) -> Self {
        let status = Arc::new(StatusBoard::new(
            mux.clone(),
            config.status_option.clone(),
            config.failure_policy,
        ));
        let namer = Namer::new(&config);
        let cache = Arc::new(NameCache::new(config.cache_location(), config.cache));
        Self {
            mux,
            namer,
            status,
            registry: Arc::new(JobRegistry::new()),
            cache,
            config,
        }
    }

    /// Entry point behind the "organize" binding: name the current window
    /// and the current session as two independent jobs sharing the
    /// session's status scope.
    pub async fn organize(&self) -> Result<()> {
        let current = self.resolve().await?;
        let window_target = Target::Window {
            session: current.session.clone(),
            window: current.window.clone(),
        };
        let session_target = Target::Session {
            session: current.session.clone(),
        };

        let window_task = {
            let this = self.clone();
            let current = current.clone();
            tokio::spawn(async move { this.run_job(window_target, current).await })
        };
        let session_task = {
            let this = self.clone();
            tokio::spawn(async move { this.run_job(session_target, current).await })
        };

        let (window_result, session_result) = tokio::join!(window_task, session_task);
        for result in [window_result, session_result] {
            if let Err(e) = result {
                warn!("naming task died: {e}");
            }
        }
        Ok(())
    }

    /// Entry point behind the "rename-window" binding.
    pub async fn rename_window(&self) -> Result<()> {
        let current = self.resolve().await?;
        let target = Target::Window {
            session: current.session.clone(),
            window: current.window.clone(),
        };
        self.run_job(target, current).await;
        Ok(())
    }

    /// Re-resolve the current target at trigger time; the user may have
    /// navigated since the key binding fired.
    async fn resolve(&self) -> Result<CurrentTarget> {
        match self.mux.current_target().await? {
            Some(current) => Ok(current),
            None => anyhow::bail!("not inside a tmux session"),
        }
    }

    /// Drive one job through Capturing → Invoking → Applying, converting
    /// every failure into a status transition. A superseded job settles
    /// silently; the superseding job owns the indicator.
    async fn run_job(&self, target: Target, current: CurrentTarget) -> JobStatus {
        let session = target.session().clone();
        let (id, generation) = self.registry.begin(&target);
        let token = self.status.mark_working(&session).await;
        let started_at = Instant::now();
        info!(job = id, target = %target, "naming job started");

        // Capturing
        let context = match self.capture(&target, &current).await {
            Ok(context) => context,
            Err(e) => {
                if !self.registry.is_current(&target, generation) {
                    debug!(job = id, "superseded during capture; discarding");
                    self.status.release(&session, token).await;
                    return JobStatus::Superseded;
                }
                match e {
                    CaptureError::TargetGone => warn!(job = id, "capture failed: target gone"),
                    CaptureError::HostUnreachable(e) => {
                        warn!(job = id, "capture failed: {e:#}")
                    }
                }
                self.status.mark_failed(&session, token).await;
                return JobStatus::Failed;
            }
        };

        let mut job = NamingJob {
            id,
            target,
            generation,
            context,
            status: JobStatus::Running,
            started_at,
        };
        let kind = match &job.target {
            Target::Window { .. } => NameKind::Window,
            Target::Session { .. } => NameKind::Session,
        };

        // Invoking
        let key = NameCache::key(kind, &job.context.text);
        let (name, fresh) = match self.cache.get(&key).await {
            Some(name) => {
                debug!(job = id, "cache hit, skipping summarizer");
                (name, false)
            }
            None => {
                let handle = self.namer.spawn(kind, &job.context.text);
                match handle.wait().await {
                    Ok(name) => (name, true),
                    Err(e) => {
                        if !self.registry.is_current(&job.target, job.generation) {
                            debug!(job = id, "superseded during invocation; discarding");
                            job.status = JobStatus::Superseded;
                            self.status.release(&session, token).await;
                            return job.status;
                        }
                        warn!(job = id, "summarizer failed: {e}");
                        job.status = JobStatus::Failed;
                        self.status.mark_failed(&session, token).await;
                        return job.status;
                    }
                }
            }
        };

        // Applying
        match apply_name(self.mux.as_ref(), &self.registry, &job, &name).await {
            Ok(()) => {
                job.status = JobStatus::Succeeded;
                if fresh {
                    self.cache.put(&key, &name).await;
                }
                info!(
                    job = id,
                    name = %name,
                    summarize_ms = job.context.captured_at.elapsed().as_millis() as u64,
                    total_ms = started_at.elapsed().as_millis() as u64,
                    "naming job finished"
                );
                self.status.mark_idle(&session, token).await;
            }
            Err(ApplyError::Superseded) => {
                job.status = JobStatus::Superseded;
                debug!(job = id, "superseded; result discarded");
                self.status.release(&session, token).await;
            }
            Err(ApplyError::TargetGone) => {
                job.status = JobStatus::Failed;
                warn!(job = id, "target vanished before rename");
                self.status.mark_failed(&session, token).await;
            }
        }
        job.status
    }

    async fn capture(
        &self,
        target: &Target,
        current: &CurrentTarget,
    ) -> Result<CapturedContext, CaptureError> {
        let enrichment = self.config.enrichment_command.as_deref();
        match target {
            Target::Window { .. } => {
                capture::capture_window(self.mux.as_ref(), current, enrichment).await
            }
            Target::Session { .. } => {
                capture::capture_session(self.mux.as_ref(), current, enrichment).await
            }
        }
    }
}

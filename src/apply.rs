use tracing::debug;

use crate::error::ApplyError;
use crate::job::{JobRegistry, NamingJob};
use crate::tmux::{Multiplexer, Target};

/// The only write path for tmux names. Refuses superseded jobs and vanished
/// targets; at most one job can apply per target per generation.
pub async fn apply_name(
    mux: &dyn Multiplexer,
    registry: &JobRegistry,
    job: &NamingJob,
    name: &str,
) -> Result<(), ApplyError> {
    if !registry.is_current(&job.target, job.generation) {
        return Err(ApplyError::Superseded);
    }

    match &job.target {
        Target::Window { window, .. } => {
            let exists = mux
                .window_exists(window)
                .await
                .map_err(|_| ApplyError::TargetGone)?;
            if !exists {
                return Err(ApplyError::TargetGone);
            }
            // the existence query yields; a retrigger may have won meanwhile
            if !registry.is_current(&job.target, job.generation) {
                return Err(ApplyError::Superseded);
            }
            mux.rename_window(window, name)
                .await
                .map_err(|_| ApplyError::TargetGone)?;
        }
        Target::Session { session } => {
            let exists = mux
                .session_exists(session)
                .await
                .map_err(|_| ApplyError::TargetGone)?;
            if !exists {
                return Err(ApplyError::TargetGone);
            }
            if !registry.is_current(&job.target, job.generation) {
                return Err(ApplyError::Superseded);
            }
            mux.rename_session(session, name)
                .await
                .map_err(|_| ApplyError::TargetGone)?;
        }
    }

    debug!(job = job.id, target = %job.target, name, "name applied");
    Ok(())
}

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::config::FailurePolicy;
use crate::tmux::{Multiplexer, SessionId};

/// Status-line text while jobs are in flight.
pub const WORKING_TEXT: &str = "organizing...";
/// Status-line text after a failure, until cleared by a later success or by
/// the user unsetting the option.
pub const FAILED_TEXT: &str = "organize failed";

/// Proof that a job holds a slot in a session's status scope. The sequence
/// number orders the job's start against recorded failures.
#[derive(Debug, Clone, Copy)]
pub struct WorkToken {
    seq: u64,
}

#[derive(Debug, Default)]
struct ScopeState {
    /// Jobs currently holding a slot.
    active: usize,
    /// Monotonic counter ordering starts and failures within the scope.
    seq: u64,
    /// Sequence number of the most recent failure, if one is still visible.
    failed_at: Option<u64>,
}

/// Session-scoped working/failed indicator, written to a tmux user option.
///
/// All transitions happen under one lock, option writes included, so the
/// indicator can never interleave two jobs' updates. The option is never
/// read back; an external `set-option -u` is simply overwritten by the next
/// transition.
pub struct StatusBoard {
    mux: Arc<dyn Multiplexer>,
    option: String,
    policy: FailurePolicy,
    scopes: Mutex<HashMap<SessionId, ScopeState>>,
}

impl StatusBoard {
    pub fn new(mux: Arc<dyn Multiplexer>, option: String, policy: FailurePolicy) -> Self {
        Self {
            mux,
            option,
            policy,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Take a slot in the session's scope and show the working marker.
    /// Idempotent at the option level: a second concurrent job does not
    /// rewrite an already-working indicator.
    pub async fn mark_working(&self, session: &SessionId) -> WorkToken {
        let mut scopes = self.scopes.lock().await;
        let scope = scopes.entry(session.clone()).or_default();
        scope.seq += 1;
        scope.active += 1;
        let token = WorkToken { seq: scope.seq };
        if scope.active == 1 || scope.failed_at.is_some() {
            self.write(session, Some(WORKING_TEXT)).await;
        }
        token
    }

    /// Settle a successful job: decrement-then-check, clearing the indicator
    /// only when this was the last active job and no failure is still owed
    /// to the user.
    pub async fn mark_idle(&self, session: &SessionId, token: WorkToken) {
        let mut scopes = self.scopes.lock().await;
        let Some(scope) = scopes.get_mut(session) else {
            return;
        };
        scope.active = scope.active.saturating_sub(1);

        let clears_failure = match self.policy {
            FailurePolicy::Sticky => scope.failed_at.is_some_and(|failed| token.seq > failed),
            FailurePolicy::LastSettledWins => true,
        };
        if clears_failure {
            scope.failed_at = None;
        }

        if scope.failed_at.is_some() {
            // an older failure outlives this success
            self.write(session, Some(FAILED_TEXT)).await;
        } else if scope.active == 0 {
            self.write(session, None).await;
        }
    }

    /// Settle a failed job. Failure wins over any concurrently finishing
    /// success and stays visible until superseded by a later one.
    pub async fn mark_failed(&self, session: &SessionId, _token: WorkToken) {
        let mut scopes = self.scopes.lock().await;
        let scope = scopes.entry(session.clone()).or_default();
        scope.active = scope.active.saturating_sub(1);
        scope.seq += 1;
        scope.failed_at = Some(scope.seq);
        self.write(session, Some(FAILED_TEXT)).await;
    }

    /// Settle a superseded job: give the slot back without claiming the
    /// indicator. Only when this was the very last slot is the scope's
    /// standing outcome flushed, so the indicator cannot stick at "working"
    /// when a superseding job finished first.
    pub async fn release(&self, session: &SessionId, _token: WorkToken) {
        let mut scopes = self.scopes.lock().await;
        let Some(scope) = scopes.get_mut(session) else {
            return;
        };
        scope.active = scope.active.saturating_sub(1);
        if scope.active == 0 {
            if scope.failed_at.is_some() {
                self.write(session, Some(FAILED_TEXT)).await;
            } else {
                self.write(session, None).await;
            }
        }
    }

    /// A failed status write must not take the job down with it; the
    /// indicator is best-effort, the rename is the real outcome.
    async fn write(&self, session: &SessionId, value: Option<&str>) {
        let result = match value {
            Some(text) => self.mux.set_option(session, &self.option, text).await,
            None => self.mux.unset_option(session, &self.option).await,
        };
        if let Err(e) = result {
            warn!(session = %session, "failed to update status option: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::fake::FakeMux;

    const OPTION: &str = "@organize_status";

    fn board(policy: FailurePolicy) -> (Arc<FakeMux>, StatusBoard, SessionId) {
        let (fake, current) = FakeMux::single_window("personal", "dev");
        let fake = Arc::new(fake);
        let board = StatusBoard::new(fake.clone(), OPTION.to_string(), policy);
        (fake, board, current.session)
    }

    #[tokio::test]
    async fn indicator_clears_only_after_all_jobs_finish() {
        let (fake, board, session) = board(FailurePolicy::Sticky);

        let t1 = board.mark_working(&session).await;
        let t2 = board.mark_working(&session).await;
        assert_eq!(fake.option(&session, OPTION).as_deref(), Some(WORKING_TEXT));

        board.mark_idle(&session, t1).await;
        assert_eq!(fake.option(&session, OPTION).as_deref(), Some(WORKING_TEXT));

        board.mark_idle(&session, t2).await;
        assert_eq!(fake.option(&session, OPTION), None);

        // one set, one unset; the second mark_working wrote nothing
        assert_eq!(
            fake.option_writes(),
            vec![Some(WORKING_TEXT.to_string()), None]
        );
    }

    #[tokio::test]
    async fn failure_beats_success_from_an_older_job() {
        let (fake, board, session) = board(FailurePolicy::Sticky);

        let older = board.mark_working(&session).await;
        let failing = board.mark_working(&session).await;

        board.mark_failed(&session, failing).await;
        assert_eq!(fake.option(&session, OPTION).as_deref(), Some(FAILED_TEXT));

        // the older job finishes late and succeeds; the failure stays up
        board.mark_idle(&session, older).await;
        assert_eq!(fake.option(&session, OPTION).as_deref(), Some(FAILED_TEXT));
    }

    #[tokio::test]
    async fn a_success_triggered_after_the_failure_clears_it() {
        let (fake, board, session) = board(FailurePolicy::Sticky);

        let failing = board.mark_working(&session).await;
        board.mark_failed(&session, failing).await;
        assert_eq!(fake.option(&session, OPTION).as_deref(), Some(FAILED_TEXT));

        let retry = board.mark_working(&session).await;
        assert_eq!(fake.option(&session, OPTION).as_deref(), Some(WORKING_TEXT));
        board.mark_idle(&session, retry).await;
        assert_eq!(fake.option(&session, OPTION), None);
    }

    #[tokio::test]
    async fn last_settled_wins_lets_any_success_clear() {
        let (fake, board, session) = board(FailurePolicy::LastSettledWins);

        let older = board.mark_working(&session).await;
        let failing = board.mark_working(&session).await;
        board.mark_failed(&session, failing).await;
        board.mark_idle(&session, older).await;
        assert_eq!(fake.option(&session, OPTION), None);
    }

    #[tokio::test]
    async fn release_does_not_claim_the_indicator_while_siblings_run() {
        let (fake, board, session) = board(FailurePolicy::Sticky);

        let superseded = board.mark_working(&session).await;
        let superseding = board.mark_working(&session).await;

        board.release(&session, superseded).await;
        assert_eq!(fake.option(&session, OPTION).as_deref(), Some(WORKING_TEXT));

        board.mark_idle(&session, superseding).await;
        assert_eq!(fake.option(&session, OPTION), None);
    }

    #[tokio::test]
    async fn last_release_flushes_the_standing_outcome() {
        let (fake, board, session) = board(FailurePolicy::Sticky);

        let superseded = board.mark_working(&session).await;
        let superseding = board.mark_working(&session).await;

        // superseding job settles first; the superseded one must still
        // leave the scope clean when it finally lets go
        board.mark_idle(&session, superseding).await;
        board.release(&session, superseded).await;
        assert_eq!(fake.option(&session, OPTION), None);
    }

    #[tokio::test]
    async fn manual_external_clear_is_tolerated() {
        let (fake, board, session) = board(FailurePolicy::Sticky);

        let token = board.mark_working(&session).await;
        fake.clear_option(&session, OPTION);

        // the board never reads the option back; settling just rewrites it
        board.mark_idle(&session, token).await;
        assert_eq!(fake.option(&session, OPTION), None);

        // settling against an unknown scope is a no-op
        let other = SessionId("$9".to_string());
        board.mark_idle(&other, token).await;
        board.release(&other, token).await;
    }
}

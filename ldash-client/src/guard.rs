//! Single-flight request guard
//!
//! Every request-issuing operation (data load, top lists, parsing) goes through one
//! `RequestGuard`. The guard owns the current `RequestToken` and the `RequestSession`
//! describing the operation in flight. A session exists if and only if the guard is busy.
//!
//! Results are tagged with the token they were issued under. `end()` compares token
//! identity, so a result that arrives after its session was cancelled (and possibly after
//! a new session began) is discarded without touching the new session.

use crate::error::{ClientError, ClientResult};
use crate::ui::UiAdapter;
use ldash_common::events::{OperationKind, OperationOutcome, OutcomeKind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info};
use uuid::Uuid;

/// Cancellable handle for one unit of work, with identity
#[derive(Debug, Clone)]
pub struct RequestToken {
    id: Uuid,
    inner: CancellationToken,
}

impl RequestToken {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            inner: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Mark cancelled; every clone observes it
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Completes once the token is cancelled
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancelled()
    }

    /// Identity comparison (clones of one token are the same token)
    pub fn same_as(&self, other: &RequestToken) -> bool {
        self.id == other.id
    }
}

/// The operation currently holding the guard
#[derive(Debug, Clone)]
pub struct RequestSession {
    pub kind: OperationKind,
    pub started_at: Instant,
    pub token: RequestToken,
}

impl RequestSession {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Default)]
struct GuardState {
    session: Option<RequestSession>,
    /// Most recently issued token, kept after its session ends
    last_token: Option<RequestToken>,
}

/// Enforces at most one outstanding operation
pub struct RequestGuard {
    state: Mutex<GuardState>,
    ui: Arc<dyn UiAdapter>,
}

impl RequestGuard {
    pub fn new(ui: Arc<dyn UiAdapter>) -> Self {
        Self {
            state: Mutex::new(GuardState::default()),
            ui,
        }
    }

    /// Open a session for `kind`
    ///
    /// Rejects with `AlreadyInProgress` while another session is open. Rejected calls are
    /// not queued; the caller simply reports the rejection.
    pub fn begin(&self, kind: OperationKind) -> ClientResult<RequestToken> {
        let token = {
            let mut state = self.lock();

            if let Some(active) = &state.session {
                debug!(
                    requested = %kind,
                    active = %active.kind,
                    session_id = %active.token.id(),
                    "Request rejected, guard busy"
                );
                return Err(ClientError::AlreadyInProgress {
                    active: active.kind,
                });
            }

            if let Some(previous) = state.last_token.take() {
                if !previous.is_cancelled() {
                    debug!(session_id = %previous.id(), "Cancelling previous token before new session");
                    previous.cancel();
                }
            }

            let token = RequestToken::new();
            state.session = Some(RequestSession {
                kind,
                started_at: Instant::now(),
                token: token.clone(),
            });
            state.last_token = Some(token.clone());
            token
        };

        info!(kind = %kind, session_id = %token.id(), "Request session started");
        self.ui.on_busy_changed(true);
        Ok(token)
    }

    /// Cancel the open session, if any
    ///
    /// Cancels the token (aborting whatever network call is racing it), ends the session
    /// and reports a `cancelled` outcome. Returns the session that was cancelled; `None`
    /// when the guard was already idle.
    pub fn cancel(&self) -> Option<RequestSession> {
        let session = self.lock().session.take()?;
        self.cancel_session(session)
    }

    /// Cancel the open session only if it was issued under `token`
    ///
    /// Identity check and release happen under one lock, so a session begun by someone
    /// else in the meantime is left alone.
    pub fn cancel_if(&self, token: &RequestToken) -> Option<RequestSession> {
        let session = {
            let mut state = self.lock();
            match &state.session {
                Some(current) if current.token.same_as(token) => state.session.take(),
                _ => None,
            }
        }?;
        self.cancel_session(session)
    }

    fn cancel_session(&self, session: RequestSession) -> Option<RequestSession> {
        session.token.cancel();

        info!(
            kind = %session.kind,
            session_id = %session.token.id(),
            elapsed_ms = session.elapsed_ms(),
            "Request session cancelled"
        );
        self.finish(&session, OutcomeKind::Cancelled, "Request cancelled".to_string());
        Some(session)
    }

    /// End the session that `token` belongs to and report its outcome
    ///
    /// Returns `false` (and does nothing) when `token` is not the open session's token:
    /// the session was cancelled or already ended, so the result is stale.
    pub fn end(&self, token: &RequestToken, kind: OutcomeKind, message: impl Into<String>) -> bool {
        let session = {
            let mut state = self.lock();
            match &state.session {
                Some(current) if current.token.same_as(token) => state.session.take(),
                _ => None,
            }
        };

        let Some(session) = session else {
            debug!(session_id = %token.id(), "Discarding stale result");
            return false;
        };

        info!(
            kind = %session.kind,
            session_id = %token.id(),
            outcome = ?kind,
            elapsed_ms = session.elapsed_ms(),
            "Request session ended"
        );
        self.finish(&session, kind, message.into());
        true
    }

    pub fn is_busy(&self) -> bool {
        self.lock().session.is_some()
    }

    pub fn active_kind(&self) -> Option<OperationKind> {
        self.lock().session.as_ref().map(|s| s.kind)
    }

    pub fn current_session(&self) -> Option<RequestSession> {
        self.lock().session.clone()
    }

    /// Whether `token` belongs to the open session
    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| s.token.same_as(token))
    }

    /// Whether the open session is a `kind` session issued under `token`
    pub fn holds(&self, kind: OperationKind, token: &RequestToken) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| s.kind == kind && s.token.same_as(token))
    }

    fn finish(&self, session: &RequestSession, kind: OutcomeKind, message: String) {
        self.ui.on_busy_changed(false);
        self.ui.on_outcome(&OperationOutcome {
            kind,
            operation: session.kind,
            message,
            elapsed_ms: session.elapsed_ms(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, GuardState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::RecordingAdapter;

    fn guard() -> (RequestGuard, Arc<RecordingAdapter>) {
        let ui = Arc::new(RecordingAdapter::new());
        (RequestGuard::new(ui.clone()), ui)
    }

    #[tokio::test]
    async fn test_begin_then_end_success() {
        let (guard, ui) = guard();

        let token = guard.begin(OperationKind::DataLoad).unwrap();
        assert!(guard.is_busy());
        assert_eq!(guard.active_kind(), Some(OperationKind::DataLoad));

        assert!(guard.end(&token, OutcomeKind::Success, "Loaded 10 records"));
        assert!(!guard.is_busy());

        let recorded = ui.recorded();
        assert_eq!(recorded.busy_changes, vec![true, false]);
        assert_eq!(recorded.outcomes.len(), 1);
        assert_eq!(recorded.outcomes[0].kind, OutcomeKind::Success);
        assert_eq!(recorded.outcomes[0].operation, OperationKind::DataLoad);
    }

    #[tokio::test]
    async fn test_second_begin_rejected_and_first_unaffected() {
        let (guard, ui) = guard();

        let first = guard.begin(OperationKind::Parsing).unwrap();
        let second = guard.begin(OperationKind::DataLoad);

        assert!(matches!(
            second,
            Err(ClientError::AlreadyInProgress {
                active: OperationKind::Parsing
            })
        ));
        assert!(guard.holds(OperationKind::Parsing, &first));
        assert!(!first.is_cancelled());
        assert_eq!(ui.recorded().busy_changes, vec![true]);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (guard, ui) = guard();

        assert!(guard.cancel().is_none());

        let token = guard.begin(OperationKind::TopUrls).unwrap();
        let cancelled = guard.cancel().unwrap();
        assert!(cancelled.token.same_as(&token));
        assert!(token.is_cancelled());
        assert!(guard.cancel().is_none());

        let recorded = ui.recorded();
        assert_eq!(recorded.busy_changes, vec![true, false]);
        assert_eq!(recorded.outcomes.len(), 1);
        assert_eq!(recorded.outcomes[0].kind, OutcomeKind::Cancelled);
    }

    #[tokio::test]
    async fn test_stale_end_after_cancel_and_new_session() {
        let (guard, ui) = guard();

        let old = guard.begin(OperationKind::TopUsers).unwrap();
        guard.cancel();
        let new = guard.begin(OperationKind::DataLoad).unwrap();

        // Late result from the cancelled request
        assert!(!guard.end(&old, OutcomeKind::Success, "late"));
        assert!(guard.is_current(&new));
        assert!(guard.is_busy());

        let recorded = ui.recorded();
        assert_eq!(recorded.busy_changes, vec![true, false, true]);
        assert_eq!(recorded.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_end_twice_releases_once() {
        let (guard, ui) = guard();

        let token = guard.begin(OperationKind::Parsing).unwrap();
        assert!(guard.end(&token, OutcomeKind::Error, "boom"));
        assert!(!guard.end(&token, OutcomeKind::Error, "boom"));

        assert_eq!(ui.recorded().outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_if_only_touches_own_session() {
        let (guard, ui) = guard();

        let old = guard.begin(OperationKind::Parsing).unwrap();
        guard.cancel();
        let new = guard.begin(OperationKind::DataLoad).unwrap();

        assert!(guard.cancel_if(&old).is_none());
        assert!(guard.is_current(&new));
        assert!(!new.is_cancelled());

        let cancelled = guard.cancel_if(&new).unwrap();
        assert!(cancelled.token.same_as(&new));
        assert!(new.is_cancelled());
        assert!(!guard.is_busy());

        let recorded = ui.recorded();
        assert_eq!(recorded.busy_changes, vec![true, false, true, false]);
        assert_eq!(recorded.outcomes.len(), 2);
        assert!(recorded
            .outcomes
            .iter()
            .all(|o| o.kind == OutcomeKind::Cancelled));
    }

    #[tokio::test]
    async fn test_begin_cancels_previous_token() {
        let (guard, _ui) = guard();

        let first = guard.begin(OperationKind::DataLoad).unwrap();
        guard.end(&first, OutcomeKind::Success, "done");
        assert!(!first.is_cancelled());

        let second = guard.begin(OperationKind::DataLoad).unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!first.same_as(&second));
    }
}

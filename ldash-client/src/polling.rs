//! Status polling for a running parsing job
//!
//! Lifecycle: `Idle` → `Polling` (after the server accepted the job) → `Stopping` → `Idle`.
//!
//! While polling, one task owns a fixed-period interval. Its first tick fires immediately.
//! Each tick re-checks that the guard still holds the parsing session, polls the server once
//! (never overlapping a previous poll), folds the answer into the stage tracker and ETA
//! estimator, emits a snapshot, and decides whether the job is finished.
//!
//! `stop()` is synchronous. It cancels the run's token and aborts the task, so no tick can
//! run after it returns.

use crate::error::{ClientError, ClientResult};
use crate::eta::{EtaEstimator, EtaInput};
use crate::guard::{RequestGuard, RequestToken};
use crate::remote::{PipelineStatus, RemoteService};
use crate::stages::{ProgressTracker, StageProgressModel};
use crate::ui::UiAdapter;
use ldash_common::events::{OperationKind, OutcomeKind, ProgressSnapshot};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Polling controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
    Stopping,
}

/// How a polling run ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollExit {
    /// Pipeline finished (`isRunning=false`, 100%)
    Completed,
    /// Server reported the pipeline as cancelled
    CancelledByServer,
    /// Server reported a failure, or a non-retryable poll error
    Failed(String),
    /// Consecutive poll failures reached the configured ceiling
    Abandoned { consecutive_failures: u32 },
    /// Session ended outside the controller (user cancel, shutdown)
    Stopped,
}

#[derive(Debug, Clone)]
pub struct PollingSettings {
    pub interval: Duration,
    /// `0` tolerates failures forever
    pub max_consecutive_failures: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_consecutive_failures: 15,
        }
    }
}

struct ActiveRun {
    token: RequestToken,
    handle: Option<JoinHandle<()>>,
}

struct PollerState {
    phase: PollPhase,
    run: Option<ActiveRun>,
    tracker: ProgressTracker,
    ticks: u64,
    consecutive_failures: u32,
}

struct PollerInner {
    remote: Arc<dyn RemoteService>,
    guard: Arc<RequestGuard>,
    ui: Arc<dyn UiAdapter>,
    model: StageProgressModel,
    estimator: EtaEstimator,
    settings: PollingSettings,
    state: Mutex<PollerState>,
}

/// Drives the status polling loop for the parsing session
#[derive(Clone)]
pub struct PollingController {
    inner: Arc<PollerInner>,
}

/// What one tick decided
enum TickResult {
    Continue,
    Exit(PollExit),
}

impl PollingController {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        guard: Arc<RequestGuard>,
        ui: Arc<dyn UiAdapter>,
        model: StageProgressModel,
        estimator: EtaEstimator,
        settings: PollingSettings,
    ) -> Self {
        Self {
            inner: Arc::new(PollerInner {
                remote,
                guard,
                ui,
                model,
                estimator,
                settings,
                state: Mutex::new(PollerState {
                    phase: PollPhase::Idle,
                    run: None,
                    tracker: ProgressTracker::new(),
                    ticks: 0,
                    consecutive_failures: 0,
                }),
            }),
        }
    }

    /// Begin polling for the parsing session issued under `token`
    ///
    /// Must be called from within a tokio runtime. The returned receiver resolves when the
    /// run ends on its own; it is dropped without a value when `stop()` ends the run.
    pub fn start(&self, token: RequestToken) -> ClientResult<oneshot::Receiver<PollExit>> {
        let inner = &self.inner;
        if !inner.guard.holds(OperationKind::Parsing, &token) {
            return Err(ClientError::Cancelled);
        }

        let started_at = inner
            .guard
            .current_session()
            .map(|s| s.started_at)
            .unwrap_or_else(Instant::now);

        {
            let mut state = inner.lock();
            if state.phase != PollPhase::Idle {
                return Err(ClientError::AlreadyInProgress {
                    active: OperationKind::Parsing,
                });
            }
            state.phase = PollPhase::Polling;
            state.run = Some(ActiveRun {
                token: token.clone(),
                handle: None,
            });
            state.tracker.reset();
            state.ticks = 0;
            state.consecutive_failures = 0;
        }

        info!(
            session_id = %token.id(),
            interval_ms = inner.settings.interval.as_millis() as u64,
            "Status polling started"
        );

        let (exit_tx, exit_rx) = oneshot::channel();
        let task_inner = Arc::clone(inner);
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let exit = task_inner.run(&task_token, started_at).await;
            task_inner.finish_run(&task_token, &exit);
            let _ = exit_tx.send(exit);
        });

        let mut state = inner.lock();
        match state.run.as_mut() {
            Some(run) if run.token.same_as(&token) => run.handle = Some(handle),
            // Run already finished on another worker thread
            _ => drop(handle),
        }
        Ok(exit_rx)
    }

    /// Stop polling immediately
    ///
    /// Cancels the repeating timer, releases the parsing session if the guard still holds it,
    /// and resets stage tracking. Safe to call in any phase.
    pub fn stop(&self) {
        let run = {
            let mut state = self.inner.lock();
            if state.phase == PollPhase::Polling {
                state.phase = PollPhase::Stopping;
            }
            state.run.take()
        };

        if let Some(run) = run {
            run.token.cancel();
            if let Some(handle) = run.handle {
                handle.abort();
            }
            self.inner.guard.cancel_if(&run.token);
            info!(session_id = %run.token.id(), "Status polling stopped");
        }

        let mut state = self.inner.lock();
        state.tracker.reset();
        state.consecutive_failures = 0;
        state.phase = PollPhase::Idle;
    }

    pub fn phase(&self) -> PollPhase {
        self.inner.lock().phase
    }

    pub fn is_polling(&self) -> bool {
        self.phase() == PollPhase::Polling
    }

    /// Status polls issued by the current (or most recent) run
    pub fn ticks(&self) -> u64 {
        self.inner.lock().ticks
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }
}

impl PollerInner {
    async fn run(&self, token: &RequestToken, started_at: Instant) -> PollExit {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return PollExit::Stopped,
                _ = interval.tick() => {}
            }

            match self.tick(token, started_at).await {
                TickResult::Continue => {}
                TickResult::Exit(exit) => return exit,
            }
        }
    }

    async fn tick(&self, token: &RequestToken, started_at: Instant) -> TickResult {
        if !self.guard.holds(OperationKind::Parsing, token) {
            debug!(session_id = %token.id(), "Parsing session gone, stopping poll loop");
            return TickResult::Exit(PollExit::Stopped);
        }

        let tick = {
            let mut state = self.lock();
            state.ticks += 1;
            state.ticks
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return TickResult::Exit(PollExit::Stopped),
            result = self.remote.poll_status() => result,
        };

        // Session may have ended while the poll was in flight
        if !self.guard.holds(OperationKind::Parsing, token) {
            debug!(session_id = %token.id(), tick, "Discarding status for ended session");
            return TickResult::Exit(PollExit::Stopped);
        }

        match result {
            Ok(status) => {
                self.lock().consecutive_failures = 0;
                self.apply_status(token, started_at, tick, &status)
            }
            Err(e) if e.is_transient() => self.record_failure(token, tick, &e),
            Err(e) => {
                error!(session_id = %token.id(), tick, error = %e, "Status poll failed");
                let message = e.to_string();
                self.guard.end(token, OutcomeKind::Error, message.clone());
                TickResult::Exit(PollExit::Failed(message))
            }
        }
    }

    fn record_failure(&self, token: &RequestToken, tick: u64, e: &ClientError) -> TickResult {
        let failures = {
            let mut state = self.lock();
            state.consecutive_failures += 1;
            state.consecutive_failures
        };

        match e {
            ClientError::MalformedResponse(_) => {
                error!(session_id = %token.id(), tick, failures, error = %e, "Malformed status response")
            }
            _ => warn!(session_id = %token.id(), tick, failures, error = %e, "Status poll failed, will retry"),
        }

        let ceiling = self.settings.max_consecutive_failures;
        if ceiling > 0 && failures >= ceiling {
            let message = format!(
                "Lost contact with server after {} failed status polls",
                failures
            );
            error!(session_id = %token.id(), failures, "Abandoning parsing job");
            self.guard.end(token, OutcomeKind::Error, message);
            return TickResult::Exit(PollExit::Abandoned {
                consecutive_failures: failures,
            });
        }
        TickResult::Continue
    }

    fn apply_status(
        &self,
        token: &RequestToken,
        started_at: Instant,
        tick: u64,
        status: &PipelineStatus,
    ) -> TickResult {
        let now = Instant::now();
        let stage = status.stage();
        let tracked = self.lock().tracker.observe(
            &self.model,
            stage,
            status.stage_percent,
            status.overall_percent,
            now,
        );

        let eta = self.estimator.remaining(
            &self.model,
            now.saturating_duration_since(started_at),
            &EtaInput {
                stage: tracked.stage,
                processed_units: status.processed_units,
                total_units: status.total_units,
                overall_percent: tracked.overall_percent,
            },
        );

        let snapshot = ProgressSnapshot {
            overall_percent: tracked.overall_percent,
            eta_seconds: eta,
            stage_id: tracked.stage,
            stage_percent: tracked.stage_percent,
            processed_units: status.processed_units,
            total_units: status.total_units,
            status_text: status.status_text().map(str::to_string),
        };

        debug!(
            session_id = %token.id(),
            tick,
            overall = snapshot.overall_percent,
            stage = ?snapshot.stage_id,
            running = status.is_running,
            "Status received"
        );
        self.ui.on_progress(&snapshot);

        if status.is_cancelled {
            self.guard
                .end(token, OutcomeKind::Cancelled, "Parsing cancelled by server");
            return TickResult::Exit(PollExit::CancelledByServer);
        }

        if status.is_running {
            return TickResult::Continue;
        }

        // The server's own overall figure is authoritative for completion
        let reached_end = snapshot.overall_percent >= 100.0
            || status.overall_percent.is_some_and(|p| p >= 100.0);
        if reached_end && status.error_text().is_none() {
            info!(session_id = %token.id(), tick, "Parsing completed");
            self.guard.end(token, OutcomeKind::Success, "Parsing completed");
            return TickResult::Exit(PollExit::Completed);
        }

        let message = status
            .error_text()
            .or_else(|| status.status_text())
            .unwrap_or("Parsing stopped before completion")
            .to_string();
        warn!(session_id = %token.id(), tick, message = %message, "Pipeline reported failure");
        self.guard.end(token, OutcomeKind::Error, message.clone());
        TickResult::Exit(PollExit::Failed(message))
    }

    /// Return to idle after the run ended on its own
    fn finish_run(&self, token: &RequestToken, exit: &PollExit) {
        // stop() may already have released the session
        if *exit == PollExit::Stopped {
            self.guard.cancel_if(token);
        }

        let mut state = self.lock();
        let owns_run = state
            .run
            .as_ref()
            .is_some_and(|run| run.token.same_as(token));
        if !owns_run {
            return;
        }
        state.run = None;
        state.tracker.reset();
        state.consecutive_failures = 0;
        state.phase = PollPhase::Idle;
        drop(state);

        info!(session_id = %token.id(), exit = ?exit, "Status polling finished");
    }

    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

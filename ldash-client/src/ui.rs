//! UI adapter contract and bundled adapters
//!
//! The orchestration core never renders anything. It reports three kinds of events to a
//! `UiAdapter`: progress snapshots, busy-state changes and terminal outcomes.

use ldash_common::events::{
    DashboardEvent, EventBus, OperationOutcome, OutcomeKind, ProgressSnapshot,
};
use ldash_common::human_time::{format_elapsed_ms, format_eta};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Presentation-side obligations of the core
pub trait UiAdapter: Send + Sync {
    /// A new progress snapshot is available for the running parsing job
    fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// Input controls should be disabled (`true`) or re-enabled (`false`)
    fn on_busy_changed(&self, busy: bool);

    /// An operation finished; called exactly once per operation
    fn on_outcome(&self, outcome: &OperationOutcome);
}

/// Bridges adapter callbacks onto the EventBus (and from there to SSE clients)
pub struct EventBusAdapter {
    event_bus: EventBus,
}

impl EventBusAdapter {
    pub fn new(event_bus: EventBus) -> Self {
        Self { event_bus }
    }
}

impl UiAdapter for EventBusAdapter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.event_bus.emit_lossy(DashboardEvent::ProgressUpdated {
            snapshot: snapshot.clone(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn on_busy_changed(&self, busy: bool) {
        self.event_bus.emit_lossy(DashboardEvent::BusyChanged {
            busy,
            timestamp: chrono::Utc::now(),
        });
    }

    fn on_outcome(&self, outcome: &OperationOutcome) {
        self.event_bus.emit_lossy(DashboardEvent::OperationFinished {
            outcome: outcome.clone(),
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Writes progress and outcomes to the log, formatted for a terminal operator
#[derive(Debug, Default)]
pub struct ConsoleAdapter;

impl UiAdapter for ConsoleAdapter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let stage = snapshot
            .stage_id
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown stage".to_string());
        info!(
            "Progress: {:.1}% [{} {:.0}%] {}/{} lines, remaining {}",
            snapshot.overall_percent,
            stage,
            snapshot.stage_percent,
            snapshot.processed_units,
            snapshot.total_units,
            format_eta(&snapshot.eta_seconds)
        );
    }

    fn on_busy_changed(&self, busy: bool) {
        if busy {
            info!("Request started, input locked");
        } else {
            info!("Ready");
        }
    }

    fn on_outcome(&self, outcome: &OperationOutcome) {
        let elapsed = format_elapsed_ms(outcome.elapsed_ms);
        match outcome.kind {
            OutcomeKind::Success => info!("{} ({})", outcome.message, elapsed),
            OutcomeKind::Cancelled => warn!("{} ({})", outcome.message, elapsed),
            OutcomeKind::Error => warn!("Failed: {} ({})", outcome.message, elapsed),
        }
    }
}

/// Forwards every callback to each inner adapter in order
pub struct Fanout {
    adapters: Vec<Arc<dyn UiAdapter>>,
}

impl Fanout {
    pub fn new(adapters: Vec<Arc<dyn UiAdapter>>) -> Self {
        Self { adapters }
    }
}

impl UiAdapter for Fanout {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        for adapter in &self.adapters {
            adapter.on_progress(snapshot);
        }
    }

    fn on_busy_changed(&self, busy: bool) {
        for adapter in &self.adapters {
            adapter.on_busy_changed(busy);
        }
    }

    fn on_outcome(&self, outcome: &OperationOutcome) {
        for adapter in &self.adapters {
            adapter.on_outcome(outcome);
        }
    }
}

/// Everything a `RecordingAdapter` has seen, in arrival order per kind
#[derive(Debug, Clone, Default)]
pub struct Recorded {
    pub snapshots: Vec<ProgressSnapshot>,
    pub busy_changes: Vec<bool>,
    pub outcomes: Vec<OperationOutcome>,
}

/// Captures callbacks in memory, for headless hosts and tests
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    recorded: Mutex<Recorded>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn recorded(&self) -> Recorded {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UiAdapter for RecordingAdapter {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.lock().snapshots.push(snapshot.clone());
    }

    fn on_busy_changed(&self, busy: bool) {
        self.lock().busy_changes.push(busy);
    }

    fn on_outcome(&self, outcome: &OperationOutcome) {
        self.lock().outcomes.push(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldash_common::events::{Eta, OperationKind};

    fn outcome() -> OperationOutcome {
        OperationOutcome {
            kind: OutcomeKind::Success,
            operation: OperationKind::DataLoad,
            message: "Loaded 50 records".to_string(),
            elapsed_ms: 420,
        }
    }

    #[tokio::test]
    async fn test_event_bus_adapter_emits_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let adapter = EventBusAdapter::new(bus);

        adapter.on_busy_changed(true);
        adapter.on_outcome(&outcome());

        assert!(matches!(
            rx.recv().await.unwrap(),
            DashboardEvent::BusyChanged { busy: true, .. }
        ));
        match rx.recv().await.unwrap() {
            DashboardEvent::OperationFinished { outcome, .. } => {
                assert_eq!(outcome.message, "Loaded 50 records")
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_fanout_reaches_every_adapter() {
        let first = Arc::new(RecordingAdapter::new());
        let second = Arc::new(RecordingAdapter::new());
        let adapters: Vec<Arc<dyn UiAdapter>> = vec![first.clone(), second.clone()];
        let fanout = Fanout::new(adapters);

        fanout.on_busy_changed(true);
        fanout.on_progress(&ProgressSnapshot {
            overall_percent: 5.0,
            eta_seconds: Eta::Unknown,
            stage_id: None,
            stage_percent: 0.0,
            processed_units: 0,
            total_units: 0,
            status_text: None,
        });
        fanout.on_outcome(&outcome());

        for adapter in [first, second] {
            let recorded = adapter.recorded();
            assert_eq!(recorded.busy_changes, vec![true]);
            assert_eq!(recorded.snapshots.len(), 1);
            assert_eq!(recorded.outcomes, vec![outcome()]);
        }
    }
}

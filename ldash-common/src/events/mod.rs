//! Event types for the dashboard event system
//!
//! Provides the shared event definitions and the EventBus used to fan progress out to
//! presentation layers (SSE browser clients, console output).

mod progress_types;

pub use progress_types::{
    Eta, OperationKind, OperationOutcome, OutcomeKind, ProgressSnapshot, StageId,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Dashboard event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    /// Parsing progress recomputed on a poll tick
    ///
    /// Triggers:
    /// - SSE: Update progress bar, stage label and ETA
    ProgressUpdated {
        snapshot: ProgressSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Guard became busy or idle
    ///
    /// Triggers:
    /// - SSE: Disable / re-enable input controls
    BusyChanged {
        busy: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An operation reached its terminal outcome
    ///
    /// Triggers:
    /// - SSE: Show status line with elapsed time
    OperationFinished {
        outcome: OperationOutcome,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl DashboardEvent {
    /// SSE event name for this variant
    pub fn event_type(&self) -> &'static str {
        match self {
            DashboardEvent::ProgressUpdated { .. } => "ProgressUpdated",
            DashboardEvent::BusyChanged { .. } => "BusyChanged",
            DashboardEvent::OperationFinished { .. } => "OperationFinished",
        }
    }
}

/// Broadcast channel for dashboard events
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers start lagging
    ///
    /// # Examples
    ///
    /// ```
    /// use ldash_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DashboardEvent,
    ) -> Result<usize, broadcast::error::SendError<DashboardEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress and busy-state events are display-only; nobody listening is fine.
    pub fn emit_lossy(&self, event: DashboardEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

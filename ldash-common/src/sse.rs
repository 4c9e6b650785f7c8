//! Server-Sent Events (SSE) utilities
//!
//! Streams EventBus traffic to browser clients.

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Create an SSE stream relaying every dashboard event on `event_bus`
///
/// The first message is a `ConnectionStatus` event so the UI can show it is attached.
/// Slow clients that lag behind the channel skip the missed events and keep streaming.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     ldash_common::sse::create_event_sse_stream("ldash-client", state.event_bus.clone())
/// }
/// ```
pub fn create_event_sse_stream(
    service_name: &'static str,
    event_bus: EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);
    let mut rx = event_bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!(event = name, "SSE: Forwarding event");
                            yield Ok(Event::default().event(name).data(json));
                        }
                        Err(e) => warn!(event = name, error = %e, "SSE: Failed to serialize event"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE: Client lagging, events dropped");
                }
                Err(RecvError::Closed) => {
                    info!("SSE: {} event bus closed, ending stream", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

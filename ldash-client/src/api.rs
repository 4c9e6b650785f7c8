//! Local HTTP surface for a browser UI
//!
//! - `GET /events`: dashboard events as Server-Sent Events
//! - `GET /health`: liveness plus the current request state

use crate::dashboard::Dashboard;
use crate::polling::PollPhase;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ldash_common::events::{EventBus, OperationKind};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Dashboard,
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(dashboard: Dashboard, event_bus: EventBus) -> Self {
        Self {
            dashboard,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_operation: Option<OperationKind>,
    pub polling: bool,
    pub event_subscribers: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "ldash-client".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        busy: state.dashboard.is_busy(),
        active_operation: state.dashboard.active_kind(),
        polling: state.dashboard.poller().phase() == PollPhase::Polling,
        event_subscribers: state.event_bus.subscriber_count(),
    })
}

pub async fn event_stream(State(state): State<AppState>) -> impl IntoResponse {
    ldash_common::sse::create_event_sse_stream("ldash-client", state.event_bus.clone())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(event_stream))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Test Helper Utilities
//!
//! Shared utilities for testing ldash-client

#![allow(dead_code)]

pub mod scripted_remote;

pub use scripted_remote::{status, ScriptedRemote};

use ldash_client::eta::EtaEstimator;
use ldash_client::polling::PollingSettings;
use ldash_client::stages::StageProgressModel;
use ldash_client::ui::RecordingAdapter;
use ldash_client::{Dashboard, DashboardSettings};
use std::sync::Arc;
use std::time::Duration;

/// Dashboard over `remote` recording every UI callback
pub fn test_dashboard(
    remote: Arc<ScriptedRemote>,
    max_poll_failures: u32,
) -> (Dashboard, Arc<RecordingAdapter>) {
    let ui = Arc::new(RecordingAdapter::new());
    let dashboard = Dashboard::new(
        remote,
        ui.clone(),
        StageProgressModel::default(),
        EtaEstimator::default(),
        PollingSettings {
            interval: Duration::from_secs(2),
            max_consecutive_failures: max_poll_failures,
        },
        DashboardSettings::default(),
    );
    (dashboard, ui)
}

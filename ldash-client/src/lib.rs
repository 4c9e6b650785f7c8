//! ldash-client library interface
//!
//! Request lifecycle and staged-progress orchestration for the log dashboard. Exposed as a
//! library for the binary and for integration tests.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod eta;
pub mod guard;
pub mod polling;
pub mod remote;
pub mod stages;
pub mod ui;

pub use crate::dashboard::{Dashboard, DashboardSettings};
pub use crate::error::{ClientError, ClientResult};

use crate::config::ClientConfig;
use crate::eta::EtaEstimator;
use crate::remote::HttpRemote;
use crate::stages::StageProgressModel;
use crate::ui::UiAdapter;
use std::sync::Arc;

/// Dashboard talking HTTP to the configured server
pub fn build_dashboard(config: &ClientConfig, ui: Arc<dyn UiAdapter>) -> ClientResult<Dashboard> {
    let remote = HttpRemote::new(&config.server_url, config.endpoints.clone())?;

    Ok(Dashboard::new(
        Arc::new(remote),
        ui,
        StageProgressModel::default(),
        EtaEstimator::new(config.eta.clone()),
        config.polling_settings(),
        config.dashboard_settings(),
    ))
}

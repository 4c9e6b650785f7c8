//! Remote ingestion service contract
//!
//! The client never parses, indexes or aggregates anything itself. It talks to a remote
//! service through `RemoteService`; `HttpRemote` is the production implementation.
//!
//! Wire types accept both the structured field names (`isRunning`, `stageId`, `stagePercent`,
//! ...) and the legacy names the existing log server emits (`isParsing`, `stageProgress`,
//! `processed`, ...).

pub mod http;

pub use http::HttpRemote;

use crate::error::ClientResult;
use async_trait::async_trait;
use ldash_common::events::StageId;
use serde::{Deserialize, Serialize};

/// Default number of entries requested for the top-URL list
pub const TOP_URLS_LIMIT: u32 = 100;

/// Default number of entries requested for the top-user list
pub const TOP_USERS_LIMIT: u32 = 10;

/// Operations the dashboard needs from the remote service
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Ask the server to start ingesting the log file at `path`
    async fn start_operation(&self, path: &str) -> ClientResult<Acknowledgement>;

    /// Current pipeline status
    async fn poll_status(&self) -> ClientResult<PipelineStatus>;

    /// Ask the server to abort the running pipeline
    async fn cancel_operation(&self) -> ClientResult<Acknowledgement>;

    /// Whether `path` names a regular file on the server
    async fn check_file(&self, path: &str) -> ClientResult<FileCheck>;

    /// Whether the server already holds parsed records
    async fn check_data(&self) -> ClientResult<DataCheck>;

    /// One page of parsed log records
    async fn fetch_logs(&self, query: &LogQuery) -> ClientResult<LogPage>;

    async fn fetch_top_urls(&self, limit: u32) -> ClientResult<Vec<TopUrl>>;

    async fn fetch_top_users(&self, limit: u32) -> ClientResult<Vec<TopUser>>;
}

/// Reply to start/cancel requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledgement {
    #[serde(alias = "success", default)]
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Acknowledgement {
    /// Server-supplied reason for a rejection, or `fallback`
    pub fn rejection_reason(&self, fallback: &str) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Raw status of the remote pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineStatus {
    /// `false` when the server could not produce a status at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(alias = "isParsing")]
    pub is_running: bool,
    /// Structured stage identifier; free-form names map to no stage
    #[serde(alias = "stageName", skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    #[serde(alias = "stageProgress")]
    pub stage_percent: f64,
    #[serde(alias = "processed")]
    pub processed_units: u64,
    #[serde(alias = "total")]
    pub total_units: u64,
    /// Server's own overall figure. Drives the displayed percent only for unrecognized
    /// stages, but `>= 100` on a stopped pipeline always counts as completion.
    #[serde(alias = "progress", skip_serializing_if = "Option::is_none")]
    pub overall_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub is_cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineStatus {
    pub fn stage(&self) -> Option<StageId> {
        self.stage_id.as_deref().and_then(StageId::from_wire)
    }

    /// Non-empty status text, if any
    pub fn status_text(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Non-empty error text, if any
    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCheck {
    #[serde(default)]
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply to the startup data check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub has_data: bool,
    /// Stored record count, when the server reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Filters and paging for a data load
///
/// Empty filters are left out of the query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQuery {
    pub page: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            page: 1,
            size: 50,
            date_from: None,
            date_to: None,
            client_ip: None,
            username: None,
            status: None,
            search: None,
        }
    }
}

/// One page of log records plus the server's summary statistics
///
/// Record and statistics shapes belong to the server and are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    #[serde(default)]
    pub logs: Vec<serde_json::Value>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopUrl {
    pub url: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopUser {
    pub username: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub unique_ips: Option<u64>,
    #[serde(default)]
    pub first_seen: Option<String>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

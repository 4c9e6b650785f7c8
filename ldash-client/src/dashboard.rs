//! Dashboard facade
//!
//! Entry points the host (CLI, browser bridge) calls: data loads, top lists, parsing,
//! cancel and shutdown. Every entry point goes through the single `RequestGuard`, so at most
//! one of them talks to the server at any time.

use crate::error::{ClientError, ClientResult};
use crate::eta::EtaEstimator;
use crate::guard::{RequestGuard, RequestToken};
use crate::polling::{PollExit, PollingController, PollingSettings};
use crate::remote::{
    Acknowledgement, LogPage, LogQuery, RemoteService, TopUrl, TopUser, TOP_URLS_LIMIT,
    TOP_USERS_LIMIT,
};
use crate::stages::StageProgressModel;
use crate::ui::UiAdapter;
use ldash_common::events::{OperationKind, OutcomeKind};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Log file extensions the server can ingest
const ACCEPTED_EXTENSIONS: [&str; 2] = ["log", "txt"];

#[derive(Debug, Clone)]
pub struct DashboardSettings {
    /// Bound on the remote cancel request
    pub cancel_timeout: Duration,
    pub top_urls_limit: u32,
    pub top_users_limit: u32,
    /// Reload the last data query after parsing completes
    pub reload_after_parsing: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            cancel_timeout: Duration::from_secs(5),
            top_urls_limit: TOP_URLS_LIMIT,
            top_users_limit: TOP_USERS_LIMIT,
            reload_after_parsing: true,
        }
    }
}

struct DashboardInner {
    remote: Arc<dyn RemoteService>,
    guard: Arc<RequestGuard>,
    poller: PollingController,
    settings: DashboardSettings,
    last_query: Mutex<LogQuery>,
}

/// Request orchestration for one dashboard
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

impl Dashboard {
    pub fn new(
        remote: Arc<dyn RemoteService>,
        ui: Arc<dyn UiAdapter>,
        model: StageProgressModel,
        estimator: EtaEstimator,
        polling: PollingSettings,
        settings: DashboardSettings,
    ) -> Self {
        let guard = Arc::new(RequestGuard::new(Arc::clone(&ui)));
        let poller = PollingController::new(
            Arc::clone(&remote),
            Arc::clone(&guard),
            ui,
            model,
            estimator,
            polling,
        );

        Self {
            inner: Arc::new(DashboardInner {
                remote,
                guard,
                poller,
                settings,
                last_query: Mutex::new(LogQuery::default()),
            }),
        }
    }

    pub fn guard(&self) -> &RequestGuard {
        &self.inner.guard
    }

    pub fn poller(&self) -> &PollingController {
        &self.inner.poller
    }

    pub fn is_busy(&self) -> bool {
        self.inner.guard.is_busy()
    }

    pub fn active_kind(&self) -> Option<OperationKind> {
        self.inner.guard.active_kind()
    }

    /// Query used by the most recent data load
    pub fn last_query(&self) -> LogQuery {
        self.inner
            .last_query
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Load one page of log records
    pub async fn load_data(&self, query: LogQuery) -> ClientResult<LogPage> {
        *self
            .inner
            .last_query
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = query.clone();

        let remote = Arc::clone(&self.inner.remote);
        self.run_guarded(
            OperationKind::DataLoad,
            async move { remote.fetch_logs(&query).await },
            |page: &LogPage| format!("Loaded {} records", page.logs.len()),
        )
        .await
    }

    /// Startup check: load the last data query if the server already holds records
    ///
    /// Runs as one guarded data-load session. Resolves to `None` when the server has
    /// nothing parsed yet.
    pub async fn check_initial_data(&self) -> ClientResult<Option<LogPage>> {
        let query = self.last_query();
        let remote = Arc::clone(&self.inner.remote);
        self.run_guarded(
            OperationKind::DataLoad,
            async move {
                let check = remote.check_data().await?;
                if !check.has_data {
                    return Ok(None);
                }
                remote.fetch_logs(&query).await.map(Some)
            },
            |page: &Option<LogPage>| match page {
                Some(page) => format!("Loaded {} records", page.logs.len()),
                None => "No parsed data on the server yet; parse a log file first".to_string(),
            },
        )
        .await
    }

    pub async fn top_urls(&self) -> ClientResult<Vec<TopUrl>> {
        let limit = self.inner.settings.top_urls_limit;
        let remote = Arc::clone(&self.inner.remote);
        self.run_guarded(
            OperationKind::TopUrls,
            async move { remote.fetch_top_urls(limit).await },
            move |_| format!("Top {} URLs loaded", limit),
        )
        .await
    }

    pub async fn top_users(&self) -> ClientResult<Vec<TopUser>> {
        let limit = self.inner.settings.top_users_limit;
        let remote = Arc::clone(&self.inner.remote);
        self.run_guarded(
            OperationKind::TopUsers,
            async move { remote.fetch_top_users(limit).await },
            move |_| format!("Top {} users loaded", limit),
        )
        .await
    }

    /// Start ingesting the log file at `path` and poll until the job ends
    ///
    /// Returns once the server has accepted the job. The handle resolves with how polling
    /// ended; after a completed job the last data query is reloaded before it resolves.
    pub async fn start_parsing(&self, path: &str) -> ClientResult<JoinHandle<PollExit>> {
        let path = validate_log_path(path)?;
        let guard = &self.inner.guard;
        let token = guard.begin(OperationKind::Parsing)?;

        match self.request_start(&token, &path).await {
            Ok(()) => {}
            Err(ClientError::Cancelled) => return Err(ClientError::Cancelled),
            Err(e) => {
                warn!(session_id = %token.id(), error = %e, "Parsing start failed");
                guard.end(&token, OutcomeKind::Error, e.to_string());
                return Err(e);
            }
        }

        info!(session_id = %token.id(), path = %path, "Parsing accepted by server");
        let exit = match self.inner.poller.start(token.clone()) {
            Ok(exit) => exit,
            Err(e) => {
                guard.end(&token, OutcomeKind::Error, e.to_string());
                return Err(e);
            }
        };

        let dashboard = self.clone();
        Ok(tokio::spawn(async move {
            let exit = exit.await.unwrap_or(PollExit::Stopped);
            if exit == PollExit::Completed && dashboard.inner.settings.reload_after_parsing {
                let query = dashboard.last_query();
                if let Err(e) = dashboard.load_data(query).await {
                    warn!(error = %e, "Reload after parsing failed");
                }
            }
            exit
        }))
    }

    /// File check and start request, both abandoned if `token` is cancelled
    async fn request_start(&self, token: &RequestToken, path: &str) -> ClientResult<()> {
        let remote = &self.inner.remote;

        let check = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            check = remote.check_file(path) => check?,
        };
        if !check.exists {
            return Err(ClientError::InvalidPath(
                check
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| format!("File not found on server: {}", path)),
            ));
        }

        let ack = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            ack = remote.start_operation(path) => ack?,
        };
        if !self.inner.guard.is_current(token) {
            return Err(ClientError::Cancelled);
        }
        if !ack.accepted {
            return Err(ClientError::ServerReportedFailure(
                ack.rejection_reason("Server rejected the parsing request"),
            ));
        }
        Ok(())
    }

    /// Cancel whatever operation is in progress
    ///
    /// Local cancellation happens first and synchronously. A parsing job is then also
    /// cancelled on the server, bounded by the configured cancel timeout. Returns the kind of
    /// operation that was cancelled, or `None` when nothing was running.
    pub async fn cancel(&self) -> ClientResult<Option<OperationKind>> {
        let cancelled = self.shutdown();
        if cancelled == Some(OperationKind::Parsing) {
            let ack = self.cancel_remote().await?;
            if !ack.accepted {
                warn!(
                    reason = %ack.rejection_reason("no reason given"),
                    "Server did not confirm cancellation"
                );
            }
        }
        Ok(cancelled)
    }

    /// Stop any active timer and cancel any active token
    ///
    /// Synchronous; for process teardown. Does not contact the server.
    pub fn shutdown(&self) -> Option<OperationKind> {
        let active = self.inner.guard.active_kind();
        self.inner.poller.stop();
        self.inner.guard.cancel();
        if let Some(kind) = active {
            info!(kind = %kind, "Active request cancelled");
        }
        active
    }

    /// Ask the server to abort the parsing job, bounded by the cancel timeout
    pub async fn cancel_remote(&self) -> ClientResult<Acknowledgement> {
        let timeout = self.inner.settings.cancel_timeout;
        match tokio::time::timeout(timeout, self.inner.remote.cancel_operation()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Transport(format!(
                "cancel request timed out after {} ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Run `request` as a guarded `kind` operation
    async fn run_guarded<T, F>(
        &self,
        kind: OperationKind,
        request: F,
        success_message: impl FnOnce(&T) -> String,
    ) -> ClientResult<T>
    where
        F: Future<Output = ClientResult<T>>,
    {
        let guard = &self.inner.guard;
        let token = guard.begin(kind)?;

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            result = request => result,
        };

        match result {
            Ok(value) => {
                if guard.end(&token, OutcomeKind::Success, success_message(&value)) {
                    Ok(value)
                } else {
                    Err(ClientError::Cancelled)
                }
            }
            Err(e) => {
                warn!(kind = %kind, session_id = %token.id(), error = %e, "Request failed");
                guard.end(&token, OutcomeKind::Error, e.to_string());
                Err(e)
            }
        }
    }
}

/// Local checks on a log file path before anything is sent to the server
///
/// The path must be absolute-looking (contain a separator) and name a `.log` or `.txt` file.
pub fn validate_log_path(raw: &str) -> ClientResult<String> {
    let path = raw.trim();
    if path.is_empty() {
        return Err(ClientError::InvalidPath("path is empty".to_string()));
    }
    if !path.contains('/') && !path.contains('\\') {
        return Err(ClientError::InvalidPath(format!(
            "full path required (for example /var/log/access.log), got {}",
            path
        )));
    }

    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(path.to_string()),
        _ => Err(ClientError::InvalidPath(format!(
            "only .log and .txt files are supported: {}",
            path
        ))),
    }
}

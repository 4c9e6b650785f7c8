//! In-memory `RemoteService` with scripted replies and call counters

use async_trait::async_trait;
use ldash_client::remote::{
    Acknowledgement, DataCheck, FileCheck, LogPage, LogQuery, PipelineStatus, RemoteService,
    TopUrl, TopUser,
};
use ldash_client::{ClientError, ClientResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Status with a structured stage
pub fn status(running: bool, stage: &str, stage_percent: f64) -> PipelineStatus {
    PipelineStatus {
        is_running: running,
        stage_id: Some(stage.to_string()),
        stage_percent,
        ..PipelineStatus::default()
    }
}

/// Scripted remote
///
/// Status polls pop queued replies in order; once the queue is empty every poll returns
/// `idle_status`. Other calls answer from the builder settings.
pub struct ScriptedRemote {
    statuses: Mutex<VecDeque<ClientResult<PipelineStatus>>>,
    idle_status: PipelineStatus,
    file_exists: bool,
    has_data: bool,
    start_accepted: bool,
    log_records: usize,
    /// Delay before every status reply
    poll_delay: Duration,
    /// Delay before data, top-list and start replies
    request_delay: Duration,
    /// Delay before cancel replies
    cancel_delay: Duration,
    polls: AtomicU64,
    starts: AtomicU64,
    cancels: AtomicU64,
    log_fetches: AtomicU64,
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            idle_status: status(true, "countingLines", 0.0),
            file_exists: true,
            has_data: true,
            start_accepted: true,
            log_records: 3,
            poll_delay: Duration::ZERO,
            request_delay: Duration::ZERO,
            cancel_delay: Duration::ZERO,
            polls: AtomicU64::new(0),
            starts: AtomicU64::new(0),
            cancels: AtomicU64::new(0),
            log_fetches: AtomicU64::new(0),
        }
    }
}

impl ScriptedRemote {
    pub fn with_statuses(statuses: Vec<ClientResult<PipelineStatus>>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            ..Self::default()
        }
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_cancel_delay(mut self, delay: Duration) -> Self {
        self.cancel_delay = delay;
        self
    }

    pub fn with_idle_status(mut self, status: PipelineStatus) -> Self {
        self.idle_status = status;
        self
    }

    pub fn file_missing(mut self) -> Self {
        self.file_exists = false;
        self
    }

    pub fn without_data(mut self) -> Self {
        self.has_data = false;
        self
    }

    pub fn rejecting_start(mut self) -> Self {
        self.start_accepted = false;
        self
    }

    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> u64 {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn log_fetches(&self) -> u64 {
        self.log_fetches.load(Ordering::SeqCst)
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteService for ScriptedRemote {
    async fn start_operation(&self, _path: &str) -> ClientResult<Acknowledgement> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Self::pause(self.request_delay).await;
        Ok(Acknowledgement {
            accepted: self.start_accepted,
            error: (!self.start_accepted).then(|| "Parsing already running".to_string()),
            message: None,
        })
    }

    async fn poll_status(&self) -> ClientResult<PipelineStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Self::pause(self.poll_delay).await;
        let next = self.statuses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.idle_status.clone()))
    }

    async fn cancel_operation(&self) -> ClientResult<Acknowledgement> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Self::pause(self.cancel_delay).await;
        Ok(Acknowledgement {
            accepted: true,
            error: None,
            message: Some("Parsing cancelled".to_string()),
        })
    }

    async fn check_file(&self, _path: &str) -> ClientResult<FileCheck> {
        Ok(FileCheck {
            exists: self.file_exists,
            error: (!self.file_exists).then(|| "File not found".to_string()),
            ..FileCheck::default()
        })
    }

    async fn check_data(&self) -> ClientResult<DataCheck> {
        Self::pause(self.request_delay).await;
        Ok(DataCheck {
            success: Some(true),
            has_data: self.has_data,
            count: Some(if self.has_data { self.log_records as u64 } else { 0 }),
            error: None,
        })
    }

    async fn fetch_logs(&self, query: &LogQuery) -> ClientResult<LogPage> {
        self.log_fetches.fetch_add(1, Ordering::SeqCst);
        Self::pause(self.request_delay).await;
        if query.page == 0 {
            return Err(ClientError::ServerReportedFailure("page must be >= 1".to_string()));
        }
        Ok(LogPage {
            logs: (0..self.log_records)
                .map(|i| serde_json::json!({ "id": i }))
                .collect(),
            total_pages: 1,
            stats: None,
        })
    }

    async fn fetch_top_urls(&self, limit: u32) -> ClientResult<Vec<TopUrl>> {
        Self::pause(self.request_delay).await;
        Ok((0..limit.min(3))
            .map(|i| TopUrl {
                url: format!("http://example.test/{}", i),
                domain: Some("example.test".to_string()),
                count: 100 - u64::from(i),
            })
            .collect())
    }

    async fn fetch_top_users(&self, limit: u32) -> ClientResult<Vec<TopUser>> {
        Self::pause(self.request_delay).await;
        Ok((0..limit.min(2))
            .map(|i| TopUser {
                username: format!("user{}", i),
                count: 10 - u64::from(i),
                unique_ips: Some(1),
                first_seen: None,
                last_seen: None,
            })
            .collect())
    }
}

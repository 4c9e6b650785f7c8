//! HTTP implementation of `RemoteService`

use super::{
    Acknowledgement, DataCheck, FileCheck, LogPage, LogQuery, PipelineStatus, RemoteService,
    TopUrl, TopUser,
};
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use ldash_common::config::EndpointPaths;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("ldash-client/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout. Covers one HTTP exchange, never the remote job itself.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `{success, data, error}` envelope used by the top-list endpoints
#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    error: Option<String>,
}

/// `{success, logs, totalPages, stats, error}` envelope used by the logs endpoint
#[derive(Debug, Deserialize)]
struct LogsEnvelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    page: LogPage,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct FilePathBody<'a> {
    file_path: &'a str,
}

/// Remote ingestion service reached over HTTP/JSON
pub struct HttpRemote {
    http_client: reqwest::Client,
    base_url: String,
    endpoints: EndpointPaths,
}

impl HttpRemote {
    pub fn new(base_url: &str, endpoints: EndpointPaths) -> ClientResult<Self> {
        Self::with_timeout(base_url, endpoints, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        endpoints: EndpointPaths,
        request_timeout: Duration,
    ) -> ClientResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Config("server URL must not be empty".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            endpoints,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Decode a JSON body
///
/// Error replies from the log server usually carry a JSON body too (`{success: false,
/// error}`), so the body is decoded regardless of HTTP status. Only an undecodable body on
/// an error status is reported as a transport failure.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    let body = response.text().await?;

    match serde_json::from_str::<T>(&body) {
        Ok(value) => Ok(value),
        Err(e) if status.is_success() => Err(ClientError::MalformedResponse(e.to_string())),
        Err(_) => Err(ClientError::Transport(format!("HTTP {}", status.as_u16()))),
    }
}

fn reported_failure(error: Option<String>, fallback: &str) -> ClientError {
    ClientError::ServerReportedFailure(
        error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    )
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn start_operation(&self, path: &str) -> ClientResult<Acknowledgement> {
        debug!(path, "Requesting parsing start");
        let response = self
            .http_client
            .post(self.url(&self.endpoints.start_parsing))
            .json(&FilePathBody { file_path: path })
            .send()
            .await?;
        read_json(response).await
    }

    async fn poll_status(&self) -> ClientResult<PipelineStatus> {
        let response = self
            .http_client
            .get(self.url(&self.endpoints.parsing_status))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!(
                "status endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let pipeline: PipelineStatus = read_json(response).await?;
        if pipeline.success == Some(false) {
            return Err(ClientError::Transport(format!(
                "status unavailable: {}",
                pipeline.error_text().unwrap_or("no reason given")
            )));
        }
        Ok(pipeline)
    }

    async fn cancel_operation(&self) -> ClientResult<Acknowledgement> {
        debug!("Requesting parsing cancellation");
        let response = self
            .http_client
            .post(self.url(&self.endpoints.cancel_parsing))
            .send()
            .await?;
        read_json(response).await
    }

    async fn check_file(&self, path: &str) -> ClientResult<FileCheck> {
        let response = self
            .http_client
            .post(self.url(&self.endpoints.check_file))
            .json(&FilePathBody { file_path: path })
            .send()
            .await?;
        read_json(response).await
    }

    async fn check_data(&self) -> ClientResult<DataCheck> {
        let response = self
            .http_client
            .get(self.url(&self.endpoints.check_data))
            .send()
            .await?;

        let check: DataCheck = read_json(response).await?;
        if check.success == Some(false) {
            return Err(reported_failure(check.error, "data check failed"));
        }
        Ok(check)
    }

    async fn fetch_logs(&self, query: &LogQuery) -> ClientResult<LogPage> {
        debug!(page = query.page, size = query.size, "Fetching logs");
        let response = self
            .http_client
            .get(self.url(&self.endpoints.logs))
            .query(query)
            .send()
            .await?;

        let envelope: LogsEnvelope = read_json(response).await?;
        if envelope.success == Some(false) {
            return Err(reported_failure(envelope.error, "log query failed"));
        }
        Ok(envelope.page)
    }

    async fn fetch_top_urls(&self, limit: u32) -> ClientResult<Vec<TopUrl>> {
        let response = self
            .http_client
            .get(self.url(&self.endpoints.top_urls))
            .query(&[("limit", limit)])
            .send()
            .await?;

        let envelope: ListEnvelope<TopUrl> = read_json(response).await?;
        if envelope.success == Some(false) {
            return Err(reported_failure(envelope.error, "top URL query failed"));
        }
        Ok(envelope.data)
    }

    async fn fetch_top_users(&self, limit: u32) -> ClientResult<Vec<TopUser>> {
        let response = self
            .http_client
            .get(self.url(&self.endpoints.top_users))
            .query(&[("limit", limit)])
            .send()
            .await?;

        let envelope: ListEnvelope<TopUser> = read_json(response).await?;
        if envelope.success == Some(false) {
            return Err(reported_failure(envelope.error, "top user query failed"));
        }
        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let remote = HttpRemote::new("http://localhost:8080/", EndpointPaths::default()).unwrap();
        assert_eq!(remote.base_url(), "http://localhost:8080");
        assert_eq!(
            remote.url("/api/parsing-status"),
            "http://localhost:8080/api/parsing-status"
        );
        assert_eq!(remote.url("api/logs"), "http://localhost:8080/api/logs");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = HttpRemote::new("  ", EndpointPaths::default());
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_logs_envelope_flattens_page() {
        let envelope: LogsEnvelope = serde_json::from_str(
            r#"{"success": true, "logs": [{"id": 1}, {"id": 2}], "totalPages": 7, "stats": {"total": 2}}"#,
        )
        .unwrap();
        assert_eq!(envelope.success, Some(true));
        assert_eq!(envelope.page.logs.len(), 2);
        assert_eq!(envelope.page.total_pages, 7);
    }
}

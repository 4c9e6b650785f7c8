//! Error types for ldash-client
//!
//! Taxonomy:
//! - `AlreadyInProgress`: guard rejection, user-facing, non-fatal
//! - `Transport` / `MalformedResponse`: remote call failed; tolerated while polling,
//!   surfaced immediately for start and cancel requests
//! - `ServerReportedFailure`: the pipeline itself failed, terminal
//! - `Cancelled`: the operation's token was cancelled (a normal terminal outcome)

use ldash_common::events::OperationKind;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Another operation holds the request guard
    #[error("Another request is already in progress ({active})")]
    AlreadyInProgress { active: OperationKind },

    /// Network or HTTP-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Remote pipeline reported a failure
    #[error("Server reported failure: {0}")]
    ServerReportedFailure(String),

    /// Operation was cancelled before its result could be applied
    #[error("Request cancelled")]
    Cancelled,

    /// Log file path rejected before contacting the server
    #[error("Invalid log file path: {0}")]
    InvalidPath(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// ldash-common error
    #[error("Common error: {0}")]
    Common(#[from] ldash_common::Error),
}

impl ClientError {
    /// Whether a status poll failing with this error may be retried on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::MalformedResponse(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::MalformedResponse(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

//! Progress and outcome type definitions
//!
//! Supporting types carried by dashboard events: the operation kinds guarded by the
//! client, the server pipeline stage vocabulary, progress snapshots and outcomes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// User-initiated operation kinds. At most one is in flight at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    /// Paged, filtered record fetch
    DataLoad,
    /// Top URLs aggregate fetch
    TopUrls,
    /// Top users aggregate fetch
    TopUsers,
    /// Remote ingestion job (start + status polling)
    Parsing,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::DataLoad => "dataLoad",
            OperationKind::TopUrls => "topUrls",
            OperationKind::TopUsers => "topUsers",
            OperationKind::Parsing => "parsing",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageId {
    CountingLines,
    Parsing,
    Finalization,
    Indexing,
    Statistics,
}

impl StageId {
    /// Parse a structured stage identifier as sent by the status endpoint.
    ///
    /// Accepts camelCase, snake_case, SCREAMING_SNAKE and kebab-case spellings.
    /// Returns `None` for anything else (including free-form status text).
    pub fn from_wire(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "countinglines" => Some(StageId::CountingLines),
            "parsing" => Some(StageId::Parsing),
            "finalization" => Some(StageId::Finalization),
            "indexing" => Some(StageId::Indexing),
            "statistics" => Some(StageId::Statistics),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::CountingLines => "countingLines",
            StageId::Parsing => "parsing",
            StageId::Finalization => "finalization",
            StageId::Indexing => "indexing",
            StageId::Statistics => "statistics",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated time remaining
///
/// Serialized as a number of seconds, or the string `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// Not enough information to estimate (cold start, zero throughput)
    Unknown,
    /// Seconds remaining; `0.0` means complete
    Seconds(f64),
}

impl Eta {
    pub fn seconds(&self) -> Option<f64> {
        match self {
            Eta::Unknown => None,
            Eta::Seconds(s) => Some(*s),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Eta::Unknown)
    }
}

impl Serialize for Eta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Eta::Unknown => serializer.serialize_str("unknown"),
            Eta::Seconds(s) => serializer.serialize_f64(*s),
        }
    }
}

impl<'de> Deserialize<'de> for Eta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Seconds(f64),
            Sentinel(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Seconds(s) => Ok(Eta::Seconds(s)),
            Repr::Sentinel(s) if s == "unknown" => Ok(Eta::Unknown),
            Repr::Sentinel(other) => Err(serde::de::Error::custom(format!(
                "expected seconds or \"unknown\", got {:?}",
                other
            ))),
        }
    }
}

/// Normalized progress of the running parsing job, recomputed on every poll tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Overall percent (0.0 - 100.0), non-decreasing within one operation
    pub overall_percent: f64,
    /// Estimated seconds remaining
    pub eta_seconds: Eta,
    /// Current stage, `None` when the server sent an unrecognized id
    pub stage_id: Option<StageId>,
    /// Percent within the current stage (0.0 - 100.0)
    pub stage_percent: f64,
    /// Units processed (lines during the parsing stage)
    pub processed_units: u64,
    /// Units expected in total
    pub total_units: u64,
    /// Free-form server status text, passed through for display
    pub status_text: Option<String>,
}

/// Terminal outcome category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Success,
    Error,
    Cancelled,
}

/// Terminal outcome of one operation, reported exactly once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub kind: OutcomeKind,
    pub operation: OperationKind,
    pub message: String,
    pub elapsed_ms: u64,
}

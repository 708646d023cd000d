//! Wire types and error definitions for the remote log store.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Config lives with the rest of the schema.
pub use crate::config::schema::LogStoreConfig;

/// One key/value pair of a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContent {
    pub key: String,
    pub value: String,
}

/// One log entry as sent to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp in seconds.
    pub time: u32,
    pub contents: Vec<LogContent>,
}

impl LogEntry {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.contents
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value.as_str())
    }
}

/// Payload of a single put: entries tagged with topic and source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroup {
    pub topic: String,
    pub source: String,
    pub logs: Vec<LogEntry>,
}

/// Outcome of one flush attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Records taken from the buffer.
    pub records: usize,
    /// Whether the whole batch went out in one put.
    pub batched: bool,
    /// Records the store accepted.
    pub delivered: usize,
    /// Records dropped after their individual put failed.
    pub discarded: usize,
}

/// Errors that can occur while talking to the log store.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// The endpoint is not a usable base URL.
    #[error("invalid log store endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The project does not exist or cannot be reached.
    #[error("unknown log store project {project}: {reason}")]
    UnknownProject { project: String, reason: String },

    /// The store does not exist inside the project.
    #[error("unknown log store {store}: {reason}")]
    UnknownStore { store: String, reason: String },

    /// A put did not finish within the per-put budget.
    #[error("put timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered a put with a non-success status.
    #[error("log store rejected put with status {0}")]
    Rejected(u16),

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Result type for log store operations.
pub type LogStoreResult<T> = Result<T, LogStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_serializes_flat() {
        let group = LogGroup {
            topic: "api".into(),
            source: "10.0.0.1".into(),
            logs: vec![LogEntry {
                time: 1,
                contents: vec![LogContent {
                    key: "message".into(),
                    value: "hi".into(),
                }],
            }],
        };
        let json = serde_json::to_value(&group).unwrap();
        assert_eq!(json["topic"], "api");
        assert_eq!(json["logs"][0]["contents"][0]["key"], "message");
    }

    #[test]
    fn test_error_display() {
        let err = LogStoreError::Timeout(Duration::from_millis(500));
        assert_eq!(err.to_string(), "put timed out after 500ms");

        let err = LogStoreError::UnknownProject {
            project: "billing".into(),
            reason: "status 404".into(),
        };
        assert!(err.to_string().contains("billing"));
    }
}

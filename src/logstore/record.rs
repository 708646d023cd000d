//! Log records and severities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::types::{LogContent, LogEntry};

/// Field holding the event message.
pub const KEY_MESSAGE: &str = "message";
/// Field holding the numeric severity code.
pub const KEY_LEVEL: &str = "level";

/// Closed set of severities a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Severity {
    /// Wire code stored in the `level` field (syslog numbering).
    pub const fn syslog_code(self) -> u8 {
        match self {
            Severity::Panic => 0,
            Severity::Fatal => 2,
            Severity::Error => 3,
            Severity::Warn => 4,
            Severity::Info => 6,
            Severity::Debug => 7,
            Severity::Trace => 8,
        }
    }

    /// Whether records of this severity are sent to the remote store.
    pub fn is_shipped(self) -> bool {
        self <= Severity::Info
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::DEBUG => Severity::Debug,
            _ => Severity::Trace,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "panic" => Ok(Severity::Panic),
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// A timestamped set of string fields, always carrying `message` and `level`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    time: SystemTime,
    fields: BTreeMap<String, String>,
}

impl LogRecord {
    /// Create a record stamped with the current time.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(KEY_MESSAGE.to_string(), message.into());
        fields.insert(KEY_LEVEL.to_string(), severity.syslog_code().to_string());
        Self {
            time: SystemTime::now(),
            fields,
        }
    }

    /// Replace the timestamp.
    pub fn at(mut self, time: SystemTime) -> Self {
        self.time = time;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field. `message` and `level` cannot be overwritten.
    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        let key = key.into();
        if is_reserved(&key) {
            return;
        }
        self.fields.insert(key, value.to_string());
    }

    /// Fill in static fields the record does not already carry.
    pub fn merge_static(&mut self, extra: &BTreeMap<String, String>) {
        for (key, value) in extra {
            self.fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn time(&self) -> SystemTime {
        self.time
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn message(&self) -> &str {
        self.get(KEY_MESSAGE).unwrap_or_default()
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Wire form of this record.
    pub fn to_entry(&self) -> LogEntry {
        let secs = self
            .time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        LogEntry {
            time: u32::try_from(secs).unwrap_or(u32::MAX),
            contents: self
                .fields
                .iter()
                .map(|(key, value)| LogContent {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

fn is_reserved(key: &str) -> bool {
    key == KEY_MESSAGE || key == KEY_LEVEL
}

/// Render a configured value the way it is stored in a record.
pub fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

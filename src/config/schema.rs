//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the skeleton.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logstore::FlushPolicy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SkeletonConfig {
    /// Listener definitions.
    pub listeners: ListenersConfig,

    /// Shutdown behavior.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Remote log store. Logs stay local when absent.
    pub log_store: Option<LogStoreConfig>,
}

/// The listeners started by the binary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenersConfig {
    /// REST service (`/health`, `/info`).
    pub rest: ListenerConfig,

    /// Prometheus scrape endpoint.
    pub metrics: ListenerConfig,

    /// REST service on the alternate engine.
    pub engine: ListenerConfig,

    /// WebSocket streaming service.
    pub stream: ListenerConfig,
}

impl Default for ListenersConfig {
    fn default() -> Self {
        Self {
            rest: ListenerConfig::on("0.0.0.0:8080"),
            metrics: ListenerConfig::on("0.0.0.0:8081"),
            engine: ListenerConfig::on("0.0.0.0:3000"),
            stream: ListenerConfig::on("0.0.0.0:8082"),
        }
    }
}

impl ListenersConfig {
    /// All listeners with their config key.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ListenerConfig)> {
        [
            ("rest", &self.rest),
            ("metrics", &self.metrics),
            ("engine", &self.engine),
            ("stream", &self.stream),
        ]
        .into_iter()
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Start this listener.
    pub enabled: bool,

    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration (engine listener only).
    pub tls: Option<TlsConfig>,
}

impl ListenerConfig {
    fn on(bind_address: &str) -> Self {
        Self {
            enabled: true,
            bind_address: bind_address.to_string(),
            tls: None,
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::on("0.0.0.0:8080")
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long a listener's stop waits for open connections, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Stdout log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "service_skeleton=debug").
    pub log_level: String,

    /// Stdout format.
    pub log_format: LogFormat,

    /// Install the Prometheus recorder and serve it on the metrics listener.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}

/// Remote log store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogStoreConfig {
    /// Store API base URL.
    pub endpoint: String,

    pub access_key: String,

    pub access_secret: String,

    /// Project holding the store.
    pub project: String,

    /// Store receiving the logs.
    pub store: String,

    /// Topic tag of every log group.
    pub topic: String,

    /// Source tag of every log group.
    pub source: String,

    /// Static fields added to every record.
    pub extra: BTreeMap<String, serde_json::Value>,

    /// Records per batch.
    pub batch_size: usize,

    /// Maximum time between flushes in milliseconds.
    pub flush_interval_ms: u64,

    /// Budget for a single put in milliseconds.
    pub put_timeout_ms: u64,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        let policy = FlushPolicy::default();
        Self {
            endpoint: String::new(),
            access_key: String::new(),
            access_secret: String::new(),
            project: String::new(),
            store: String::new(),
            topic: String::new(),
            source: String::new(),
            extra: BTreeMap::new(),
            batch_size: policy.batch_size,
            flush_interval_ms: policy.interval.as_millis() as u64,
            put_timeout_ms: policy.put_timeout.as_millis() as u64,
        }
    }
}

impl LogStoreConfig {
    pub fn put_timeout(&self) -> Duration {
        Duration::from_millis(self.put_timeout_ms)
    }

    /// Flush policy described by this section.
    pub fn policy(&self) -> FlushPolicy {
        FlushPolicy {
            batch_size: self.batch_size,
            interval: Duration::from_millis(self.flush_interval_ms),
            put_timeout: self.put_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SkeletonConfig::default();
        assert_eq!(config.listeners.rest.bind_address, "0.0.0.0:8080");
        assert_eq!(config.listeners.engine.bind_address, "0.0.0.0:3000");
        assert_eq!(config.shutdown.drain_timeout(), Duration::from_secs(10));
        assert!(config.log_store.is_none());
    }

    #[test]
    fn test_log_store_policy_defaults() {
        let config: LogStoreConfig = toml::from_str(
            r#"
            endpoint = "http://logs.internal"
            project = "billing"
            store = "api"

            [extra]
            region = "eu-west"
            shard = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.policy(), FlushPolicy::default());
        assert_eq!(config.extra["shard"], serde_json::json!(3));
    }
}

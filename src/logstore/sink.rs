//! Batched remote log sink.
//!
//! # Responsibilities
//! - Buffer records fired from anywhere in the process
//! - Flush when the batch is full or the flush interval has passed
//! - Fall back to one put per record when a batch put fails
//!
//! # Design Decisions
//! - One async mutex covers append, flush decision and the flush itself, so
//!   puts never overlap each other or a concurrent append
//! - A failed record is retried once on its own, then logged locally and dropped
//! - The buffer is emptied after every flush attempt, whatever its outcome

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use super::client::{HttpLogStore, LogStore};
use super::record::{stringify, LogRecord};
use super::types::{FlushReport, LogGroup, LogStoreConfig, LogStoreError, LogStoreResult};
use crate::lifecycle::ShutdownCoordinator;
use crate::observability::metrics;

/// Size and time thresholds governing flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Flush as soon as this many records are buffered.
    pub batch_size: usize,
    /// Flush once this much time has passed since the last flush.
    pub interval: Duration,
    /// Budget for each individual put.
    pub put_timeout: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            batch_size: 100,
            interval: Duration::from_secs(3),
            put_timeout: Duration::from_millis(500),
        }
    }
}

struct LogBatch {
    records: Vec<LogRecord>,
    flushed_at: Instant,
}

/// Log sink shipping batches of records to a [`LogStore`].
pub struct LogSink {
    store: Arc<dyn LogStore>,
    topic: String,
    source: String,
    extra: BTreeMap<String, String>,
    policy: FlushPolicy,
    batch: Mutex<LogBatch>,
}

impl LogSink {
    /// Create a sink writing to `store` with the default policy and no extra fields.
    pub fn new(store: Arc<dyn LogStore>, topic: impl Into<String>, source: impl Into<String>) -> Self {
        let policy = FlushPolicy::default();
        Self {
            store,
            topic: topic.into(),
            source: source.into(),
            extra: BTreeMap::new(),
            policy,
            batch: Mutex::new(LogBatch {
                records: Vec::with_capacity(policy.batch_size),
                flushed_at: Instant::now(),
            }),
        }
    }

    /// Connect to the HTTP store described by `config`.
    ///
    /// Nothing is constructed if the project or store cannot be resolved.
    pub async fn connect(config: &LogStoreConfig) -> LogStoreResult<Self> {
        let store = HttpLogStore::connect(config).await?;
        let extra = config
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), stringify(value)))
            .collect();

        Ok(Self::new(Arc::new(store), &config.topic, &config.source)
            .with_policy(config.policy())
            .with_extra(extra))
    }

    pub fn with_policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self.batch.get_mut().records.reserve(policy.batch_size);
        self
    }

    /// Static fields merged into every record that does not set them itself.
    pub fn with_extra(mut self, extra: BTreeMap<String, String>) -> Self {
        self.extra = extra;
        self
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    /// Buffer a record, flushing if the policy says so.
    ///
    /// Returns the report of the flush this call performed, if any.
    pub async fn fire(&self, mut record: LogRecord) -> Option<FlushReport> {
        record.merge_static(&self.extra);

        let mut batch = self.batch.lock().await;
        batch.records.push(record);
        self.flush_locked(&mut batch, false).await
    }

    /// Flush buffered records.
    ///
    /// Without `force`, nothing happens until the batch is full or the interval
    /// has passed. An empty buffer is never flushed.
    pub async fn flush(&self, force: bool) -> Option<FlushReport> {
        let mut batch = self.batch.lock().await;
        self.flush_locked(&mut batch, force).await
    }

    /// Number of records waiting for the next flush.
    pub async fn pending(&self) -> usize {
        self.batch.lock().await.records.len()
    }

    /// Flush on a timer and once more at shutdown.
    ///
    /// The ticker evaluates the policy every interval, so a lone record goes out
    /// about one interval after the previous flush even without further traffic.
    /// The registered hook stops the ticker and forces a final flush. When
    /// shutdown has already started, the ticker is aborted right away.
    pub fn spawn_flusher(self: &Arc<Self>, shutdown: &ShutdownCoordinator) -> JoinHandle<()> {
        let sink = Arc::clone(self);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sink.policy.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                sink.flush(false).await;
            }
        });

        let abort = ticker.abort_handle();
        let sink = Arc::clone(self);
        let registered = shutdown.register(move || async move {
            abort.abort();
            if let Some(report) = sink.flush(true).await {
                tracing::debug!(records = report.records, "Final log flush");
            }
        });
        if !registered {
            ticker.abort();
        }
        ticker
    }

    async fn flush_locked(&self, batch: &mut LogBatch, force: bool) -> Option<FlushReport> {
        if batch.records.is_empty() {
            return None;
        }
        let due = batch.records.len() >= self.policy.batch_size
            || batch.flushed_at.elapsed() >= self.policy.interval;
        if !force && !due {
            return None;
        }

        let records = std::mem::replace(
            &mut batch.records,
            Vec::with_capacity(self.policy.batch_size),
        );
        let report = self.ship(records).await;
        batch.flushed_at = Instant::now();

        metrics::record_flush(&report);
        Some(report)
    }

    async fn ship(&self, records: Vec<LogRecord>) -> FlushReport {
        let group = LogGroup {
            topic: self.topic.clone(),
            source: self.source.clone(),
            logs: records.iter().map(LogRecord::to_entry).collect(),
        };
        let mut report = FlushReport {
            records: group.logs.len(),
            ..FlushReport::default()
        };

        match self.put(&group).await {
            Ok(()) => {
                report.batched = true;
                report.delivered = report.records;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    records = report.records,
                    store = self.store.name(),
                    "Batch put failed, retrying records one by one"
                );
                for entry in group.logs {
                    let single = LogGroup {
                        topic: self.topic.clone(),
                        source: self.source.clone(),
                        logs: vec![entry],
                    };
                    match self.put(&single).await {
                        Ok(()) => report.delivered += 1,
                        Err(e) => {
                            tracing::warn!(error = %e, store = self.store.name(), "Discard log");
                            report.discarded += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            records = report.records,
            delivered = report.delivered,
            discarded = report.discarded,
            store = self.store.name(),
            "Flushed log records"
        );
        report
    }

    async fn put(&self, group: &LogGroup) -> LogStoreResult<()> {
        match timeout(self.policy.put_timeout, self.store.put_logs(group)).await {
            Ok(result) => result,
            Err(_) => Err(LogStoreError::Timeout(self.policy.put_timeout)),
        }
    }
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("store", &self.store.name())
            .field("topic", &self.topic)
            .field("source", &self.source)
            .field("policy", &self.policy)
            .finish()
    }
}

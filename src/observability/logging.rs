//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (filter, stdout format)
//! - Bridge tracing events into the remote log sink
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config, `RUST_LOG` wins when set
//! - The remote layer only enqueues; a forwarder task owns the sink calls

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ObservabilityConfig};
use crate::logstore::{LogRecord, LogSink, Severity, LOCAL_TARGET_PREFIX};

/// Install the global subscriber.
///
/// `remote` is the optional layer feeding the log sink.
pub fn init(config: &ObservabilityConfig, remote: Option<RemoteLogLayer>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (json, pretty) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Pretty => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .with(remote)
        .init();
}

/// Layer turning tracing events into [`LogRecord`]s for the remote sink.
///
/// Only events at info severity and above are forwarded. Events from the
/// log store module itself are skipped.
#[derive(Debug, Clone)]
pub struct RemoteLogLayer {
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl RemoteLogLayer {
    /// Create the layer and the receiving end for [`spawn_forwarder`].
    ///
    /// Records emitted before the forwarder starts wait in the channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl<S: Subscriber> Layer<S> for RemoteLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(LOCAL_TARGET_PREFIX) {
            return;
        }
        let severity = Severity::from(*metadata.level());
        if !severity.is_shipped() {
            return;
        }

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let mut record = LogRecord::new(severity, fields.message);
        for (key, value) in fields.values {
            record.insert(key, value);
        }
        record.insert("target", metadata.target());

        // The forwarder is gone once the sink is disabled; dropping is fine.
        let _ = self.tx.send(record);
    }
}

/// Feed records from the layer's channel into `sink`, one at a time.
pub fn spawn_forwarder(
    sink: Arc<LogSink>,
    mut records: mpsc::UnboundedReceiver<LogRecord>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            sink.fire(record).await;
        }
    })
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    values: BTreeMap<String, String>,
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.values.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.values.insert(field.name().to_string(), format!("{:?}", value));
        }
    }
}

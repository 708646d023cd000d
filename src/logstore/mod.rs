//! Remote log store subsystem.
//!
//! # Data Flow
//! ```text
//! tracing event (any task)
//!     → observability::logging::RemoteLogLayer (record.rs: LogRecord)
//!     → unbounded channel → forwarder task
//!     → sink.rs (LogSink::fire: buffer, flush policy)
//!     → client.rs (LogStore::put_logs, one LogGroup per put)
//! ```
//!
//! # Failure Handling
//! - Unknown project/store: construction fails, no sink
//! - Batch put fails: every record is put on its own once
//! - Record put fails: logged locally, dropped
//!
//! Events emitted from inside this module are never shipped back to the store.

pub mod client;
pub mod record;
pub mod sink;
pub mod types;

pub use client::{HttpLogStore, LogStore};
pub use record::{LogRecord, Severity};
pub use sink::{FlushPolicy, LogSink};
pub use types::{FlushReport, LogContent, LogEntry, LogGroup, LogStoreError};

/// Target prefix of events that stay local.
pub const LOCAL_TARGET_PREFIX: &str = module_path!();

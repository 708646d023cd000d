//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → remote log store (logging::RemoteLogLayer → logstore::LogSink)
//!     → metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Shipping logs never blocks the code that emits them
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

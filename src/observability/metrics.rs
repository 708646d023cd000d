//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define skeleton metrics (listener exits, shutdown hooks, log flushes)
//! - Install the Prometheus recorder and expose it as an Axum router
//!
//! # Metrics
//! - `skeleton_listener_exits_total` (counter): by listener, outcome
//! - `skeleton_shutdown_hooks_total` (counter): hooks executed
//! - `skeleton_log_flushes_total` (counter): by mode (batch, fallback)
//! - `skeleton_log_records_delivered_total` (counter)
//! - `skeleton_log_records_discarded_total` (counter)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade: a no-op until a recorder is installed
//! - Only the binary installs the recorder, tests never do

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::logstore::FlushReport;

/// Install the global Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Router serving the rendered metrics at `GET /metrics`.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

/// Record how a listener's run ended.
pub fn record_listener_exit(listener: &str, outcome: &'static str) {
    metrics::counter!(
        "skeleton_listener_exits_total",
        "listener" => listener.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_shutdown_hook() {
    metrics::counter!("skeleton_shutdown_hooks_total").increment(1);
}

/// Record the outcome of one sink flush.
pub fn record_flush(report: &FlushReport) {
    let mode = if report.batched { "batch" } else { "fallback" };
    metrics::counter!("skeleton_log_flushes_total", "mode" => mode).increment(1);
    metrics::counter!("skeleton_log_records_delivered_total").increment(report.delivered as u64);
    metrics::counter!("skeleton_log_records_discarded_total").increment(report.discarded as u64);
}

//! Service skeleton.
//!
//! # Architecture Overview
//!
//! ```text
//!   SIGINT / SIGTERM
//!         │
//!         ▼
//!   ┌──────────────────────┐  hooks, last registered first
//!   │ ShutdownCoordinator  │────────────────────────────────┐
//!   └──────────────────────┘                                │
//!         ▲ register(stop)                                  ▼
//!   ┌──────────────────────┐     ┌────────────────────────────────────┐
//!   │    run_listeners     │────▶│ rest │ metrics │ engine │ stream   │
//!   └──────────────────────┘     └────────────────────────────────────┘
//!
//!   tracing events ──▶ RemoteLogLayer ──▶ forwarder ──▶ LogSink ──▶ log store
//!                                                         ▲
//!                                       flush ticker ─────┘ (final flush on shutdown)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use service_skeleton::config::{load_config, SkeletonConfig};
use service_skeleton::host;
use service_skeleton::lifecycle::{run_listeners, ShutdownCoordinator};
use service_skeleton::logstore::LogSink;
use service_skeleton::net::{EngineListener, HttpListener, Listener, RpcListener};
use service_skeleton::observability::logging::{self, RemoteLogLayer};
use service_skeleton::observability::metrics;
use service_skeleton::services::{self, EchoStream};

#[derive(Parser, Debug)]
#[command(name = "service-skeleton", version, about = "Multi-listener service skeleton")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => SkeletonConfig::default(),
    };

    let (remote, records) = match config.log_store {
        Some(_) => {
            let (layer, rx) = RemoteLogLayer::channel();
            (Some(layer), Some(rx))
        }
        None => (None, None),
    };
    logging::init(&config.observability, remote);

    tracing::info!(
        host = %host::host_name(),
        ip = %host::host_ip(),
        version = %host::version(),
        "service-skeleton starting"
    );

    let shutdown = Arc::new(ShutdownCoordinator::new());
    shutdown.install_signal_handler()?;

    if let (Some(store), Some(records)) = (&config.log_store, records) {
        match LogSink::connect(store).await {
            Ok(sink) => {
                let sink = Arc::new(sink);
                logging::spawn_forwarder(Arc::clone(&sink), records);
                sink.spawn_flusher(&shutdown);
                tracing::info!(
                    endpoint = %store.endpoint,
                    project = %store.project,
                    store = %store.store,
                    "Remote log sink connected"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Remote log sink unavailable, logging locally only");
            }
        }
    }

    let prometheus = if config.observability.metrics_enabled {
        match metrics::install_recorder() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install metrics recorder");
                None
            }
        }
    } else {
        None
    };

    let listeners = build_listeners(&config, prometheus);
    tracing::info!(count = listeners.len(), "Starting listeners");

    if let Err(e) = run_listeners(&shutdown, listeners).await {
        tracing::error!(error = %e, "Shutdown");
    }

    shutdown.wait().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_listeners(
    config: &SkeletonConfig,
    prometheus: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> Vec<Box<dyn Listener>> {
    let drain = config.shutdown.drain_timeout();
    let listeners = &config.listeners;
    let mut built: Vec<Box<dyn Listener>> = Vec::new();

    if listeners.rest.enabled {
        built.push(Box::new(
            HttpListener::new("rest", &listeners.rest.bind_address, services::router())
                .with_drain_timeout(drain),
        ));
    }

    if listeners.metrics.enabled {
        match prometheus {
            Some(handle) => built.push(Box::new(
                HttpListener::new("metrics", &listeners.metrics.bind_address, metrics::router(handle))
                    .with_drain_timeout(drain),
            )),
            None => tracing::warn!("Metrics listener enabled without a recorder, skipping"),
        }
    }

    if listeners.engine.enabled {
        let mut engine =
            EngineListener::new("engine", &listeners.engine.bind_address, services::router())
                .with_drain_timeout(drain);
        if let Some(tls) = &listeners.engine.tls {
            engine = engine.with_tls(tls.clone());
        }
        built.push(Box::new(engine));
    }

    if listeners.stream.enabled {
        built.push(Box::new(
            RpcListener::new("stream", &listeners.stream.bind_address, EchoStream::new())
                .with_drain_timeout(drain),
        ));
    }

    built
}

//! Listener adapter subsystem.
//!
//! # Data Flow
//! ```text
//! Concrete server (axum Router, axum-server engine, RpcServer)
//!     → http.rs / engine.rs / rpc.rs (thin adapter)
//!     → Listener trait (name, run, stop)
//!     → lifecycle::startup (one task per listener)
//!
//! Listener states:
//!     Idle → Serving → Stopping → Closed
//!              └──────→ Failed (bind / serve error)
//! ```
//!
//! # Design Decisions
//! - `run` blocks its task until stopped or failed
//! - A deliberate stop surfaces as `ListenerError::Closed`, never as a failure
//! - `stop` is the only way to end `run`; no cancellation token reaches it
//! - Draining is bounded per listener; overrunning it fails `stop`, not the process

pub mod control;
pub mod engine;
pub mod http;
pub mod rpc;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use engine::EngineListener;
pub use http::HttpListener;
pub use rpc::{RpcListener, RpcServer};

/// Drain budget applied by `stop` when none is configured.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors produced by listener adapters.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The listener was stopped on purpose. Not a failure.
    #[error("listener closed")]
    Closed,

    /// Failed to bind the configured address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The server failed while serving.
    #[error("serve error: {0}")]
    Serve(#[source] std::io::Error),

    /// Connections did not drain within the budget during `stop`.
    #[error("connections still open after draining for {0:?}")]
    DrainTimeout(Duration),

    /// The task running the listener panicked.
    #[error("listener task panicked: {0}")]
    Panicked(String),

    /// Any other adapter-specific failure.
    #[error("{0}")]
    Other(String),
}

impl ListenerError {
    /// Whether this is the benign "closed after stop" outcome.
    pub fn is_closed(&self) -> bool {
        matches!(self, ListenerError::Closed)
    }
}

/// Uniform capability set over a concrete network server.
///
/// Implementations wrap exactly one server. `run` must return
/// [`ListenerError::Closed`] once `stop` has been called, and `stop` must make an
/// in-flight `run` return promptly.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    /// Human-readable identity, including the bind address.
    fn name(&self) -> String;

    /// Serve until stopped or failed.
    async fn run(&self) -> Result<(), ListenerError>;

    /// Ask the listener to stop and wait for it to drain.
    async fn stop(&self) -> Result<(), ListenerError>;
}

/// Build the display name shared by all adapters.
pub(crate) fn display_name(kind: &str, addr: &str, name: &str) -> String {
    format!("{} ({}), {}", kind, addr, name)
}

/// Turn an I/O error from a server future into a listener error.
///
/// Engines that bind lazily report bind problems through the same error path as
/// serve problems; the error kind tells them apart.
pub(crate) fn classify_io(addr: &str, err: std::io::Error) -> ListenerError {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::AddrInUse | ErrorKind::AddrNotAvailable | ErrorKind::PermissionDenied => {
            ListenerError::Bind {
                addr: addr.to_string(),
                source: err,
            }
        }
        _ => ListenerError::Serve(err),
    }
}

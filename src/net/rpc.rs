//! Streaming RPC listener.
//!
//! The adapter owns the socket; the wrapped server only has to serve an
//! already-bound `TcpListener` and honor `stop`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use super::control::ServeControl;
use super::{display_name, Listener, ListenerError, DEFAULT_DRAIN_TIMEOUT};

/// What a streaming RPC server must provide to be wrapped by [`RpcListener`].
#[async_trait]
pub trait RpcServer: Send + Sync + 'static {
    /// Serve connections from `listener` until stopped.
    async fn serve(&self, listener: TcpListener) -> std::io::Result<()>;

    /// Stop serving and close open streams. Must make `serve` return, including
    /// a `serve` that starts after this call.
    fn stop(&self);
}

/// Listener adapter for an [`RpcServer`].
pub struct RpcListener<S> {
    name: String,
    addr: String,
    server: S,
    drain_timeout: Duration,
    control: ServeControl,
}

impl<S: RpcServer> RpcListener<S> {
    pub fn new(name: impl Into<String>, addr: impl Into<String>, server: S) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            server,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            control: ServeControl::new(),
        }
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }
}

#[async_trait]
impl<S: RpcServer> Listener for RpcListener<S> {
    fn name(&self) -> String {
        display_name("rpc", &self.addr, &self.name)
    }

    async fn run(&self) -> Result<(), ListenerError> {
        let Some(_serving) = self.control.enter() else {
            return Err(ListenerError::Closed);
        };

        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: self.addr.clone(),
                source,
            })?;

        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(listener = %self.name, address = %local_addr, "RPC listener serving");
        }

        let served = self.server.serve(listener).await;
        if self.control.stop_requested() {
            tracing::info!(listener = %self.name, "RPC listener stopped");
            return Err(ListenerError::Closed);
        }
        served.map_err(ListenerError::Serve)
    }

    async fn stop(&self) -> Result<(), ListenerError> {
        if self.control.request_stop() {
            self.server.stop();
        }
        self.control.wait_finished(self.drain_timeout).await
    }
}

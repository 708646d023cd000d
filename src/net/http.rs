//! Request/response listener on `axum::serve`.
//!
//! # Responsibilities
//! - Bind the configured address
//! - Serve an Axum router with request tracing
//! - Drain in-flight requests on stop (graceful shutdown)

use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::control::ServeControl;
use super::{display_name, Listener, ListenerError, DEFAULT_DRAIN_TIMEOUT};

/// Listener adapter for a plain Axum router.
pub struct HttpListener {
    name: String,
    addr: String,
    router: Router,
    drain_timeout: Duration,
    control: ServeControl,
}

impl HttpListener {
    /// Create an adapter serving `router` on `addr`.
    pub fn new(name: impl Into<String>, addr: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            router,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            control: ServeControl::new(),
        }
    }

    /// Override how long `stop` waits for in-flight requests.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }
}

#[async_trait]
impl Listener for HttpListener {
    fn name(&self) -> String {
        display_name("http", &self.addr, &self.name)
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
        let local_addr = listener.local_addr().map_err(ListenerError::Serve)?;

        tracing::info!(
            listener = %self.name,
            address = %local_addr,
            "HTTP listener serving"
        );

        let app = self.router.clone().layer(TraceLayer::new_for_http());
        axum::serve(listener, app)
            .with_graceful_shutdown(self.control.stopped())
            .await
            .map_err(ListenerError::Serve)?;

        tracing::info!(listener = %self.name, "HTTP listener stopped");
        Err(ListenerError::Closed)
    }

    async fn stop(&self) -> Result<(), ListenerError> {
        if !self.control.request_stop() {
            tracing::debug!(listener = %self.name, "Stop already requested");
        }
        self.control.wait_finished(self.drain_timeout).await
    }
}

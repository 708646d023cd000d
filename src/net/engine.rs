//! Alternate HTTP engine listener on `axum-server`.
//!
//! # Responsibilities
//! - Serve an Axum router through the axum-server engine
//! - Optional TLS from PEM certificate and key files
//! - Graceful shutdown through the engine's `Handle`
//!
//! # Design Decisions
//! - The engine binds lazily, so bind failures come back from `serve` and are
//!   classified by error kind
//! - The engine force-closes connections once the drain budget is spent, so
//!   `stop` allows a short grace on top of it before giving up

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;

use super::control::ServeControl;
use super::{classify_io, display_name, Listener, ListenerError, DEFAULT_DRAIN_TIMEOUT};
use crate::config::TlsConfig;

/// Time allowed past the drain budget for the engine to tear down.
const FORCE_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Listener adapter for the axum-server engine.
pub struct EngineListener {
    name: String,
    addr: String,
    router: Router,
    tls: Option<TlsConfig>,
    handle: Handle,
    drain_timeout: Duration,
    control: ServeControl,
}

impl EngineListener {
    pub fn new(name: impl Into<String>, addr: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            router,
            tls: None,
            handle: Handle::new(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            control: ServeControl::new(),
        }
    }

    /// Serve over TLS using the given PEM files.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    fn socket_addr(&self) -> Result<SocketAddr, ListenerError> {
        self.addr.parse().map_err(|e| ListenerError::Bind {
            addr: self.addr.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })
    }
}

#[async_trait]
impl Listener for EngineListener {
    fn name(&self) -> String {
        let kind = if self.tls.is_some() { "https" } else { "engine" };
        display_name(kind, &self.addr, &self.name)
    }

    async fn run(&self) -> Result<(), ListenerError> {
        let Some(_serving) = self.control.enter() else {
            return Err(ListenerError::Closed);
        };

        let addr = self.socket_addr()?;
        let app = self.router.clone().into_make_service();

        tracing::info!(
            listener = %self.name,
            address = %addr,
            tls = self.tls.is_some(),
            "Engine listener serving"
        );

        let served = match &self.tls {
            Some(tls) => {
                let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                    .await
                    .map_err(|e| {
                        ListenerError::Other(format!(
                            "failed to load TLS material ({}, {}): {}",
                            tls.cert_path, tls.key_path, e
                        ))
                    })?;
                axum_server::bind_rustls(addr, rustls)
                    .handle(self.handle.clone())
                    .serve(app)
                    .await
            }
            None => {
                axum_server::bind(addr)
                    .handle(self.handle.clone())
                    .serve(app)
                    .await
            }
        };
        served.map_err(|e| classify_io(&self.addr, e))?;

        tracing::info!(listener = %self.name, "Engine listener stopped");
        Err(ListenerError::Closed)
    }

    async fn stop(&self) -> Result<(), ListenerError> {
        if self.control.request_stop() {
            self.handle.graceful_shutdown(Some(self.drain_timeout));
        }
        self.control
            .wait_finished(self.drain_timeout + FORCE_CLOSE_GRACE)
            .await
    }
}

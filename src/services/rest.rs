//! REST endpoints.

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::host;

/// Identity returned by `GET /info`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HostInfo {
    pub host: String,
    pub ip: String,
    pub version: String,
}

impl HostInfo {
    pub fn current() -> Self {
        Self {
            host: host::host_name(),
            ip: host::host_ip(),
            version: host::version(),
        }
    }
}

/// Router with `GET /health` and `GET /info`.
///
/// Host identity is resolved once, when the router is built.
pub fn router() -> Router {
    let info = HostInfo::current();
    Router::new()
        .route("/health", get(health))
        .route("/info", get(move || async move { Json(info) }))
}

async fn health() -> &'static str {
    "ok"
}

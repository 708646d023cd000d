//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting listener addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SkeletonConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::schema::{LogStoreConfig, SkeletonConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `config` for semantic problems.
pub fn validate_config(config: &SkeletonConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut bound: HashMap<SocketAddr, &str> = HashMap::new();
    for (key, listener) in config.listeners.iter() {
        if !listener.enabled {
            continue;
        }
        let field = format!("listeners.{}.bind_address", key);
        match listener.bind_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Some(other) = bound.insert(addr, key) {
                    errors.push(ValidationError::new(
                        field,
                        format!("{} is already used by listeners.{}", addr, other),
                    ));
                }
            }
            Err(e) => errors.push(ValidationError::new(
                field,
                format!("'{}' is not a socket address: {}", listener.bind_address, e),
            )),
        }
        if listener.tls.is_some() && key != "engine" {
            errors.push(ValidationError::new(
                format!("listeners.{}.tls", key),
                "TLS is only supported on the engine listener",
            ));
        }
    }

    if config.shutdown.drain_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "shutdown.drain_timeout_secs",
            "must be greater than zero",
        ));
    }

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid filter directive: {}", e),
        ));
    }

    if let Some(store) = &config.log_store {
        validate_log_store(store, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_log_store(store: &LogStoreConfig, errors: &mut Vec<ValidationError>) {
    let required = [
        ("endpoint", &store.endpoint),
        ("access_key", &store.access_key),
        ("access_secret", &store.access_secret),
        ("project", &store.project),
        ("store", &store.store),
        ("topic", &store.topic),
        ("source", &store.source),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            errors.push(ValidationError::new(format!("log_store.{}", name), "is required"));
        }
    }

    if !store.endpoint.trim().is_empty() {
        match Url::parse(&store.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "log_store.endpoint",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                "log_store.endpoint",
                format!("invalid URL: {}", e),
            )),
        }
    }

    let positive = [
        ("batch_size", store.batch_size as u64),
        ("flush_interval_ms", store.flush_interval_ms),
        ("put_timeout_ms", store.put_timeout_ms),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ValidationError::new(
                format!("log_store.{}", name),
                "must be greater than zero",
            ));
        }
    }
}

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SkeletonConfig (validated, immutable)
//!     → read once by the binary to build listeners, logging and the sink
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ListenerConfig;
pub use schema::ListenersConfig;
pub use schema::LogFormat;
pub use schema::LogStoreConfig;
pub use schema::ObservabilityConfig;
pub use schema::ShutdownConfig;
pub use schema::SkeletonConfig;
pub use schema::TlsConfig;

//! Service skeleton library.
//!
//! Building blocks for a long-running service process: heterogeneous network
//! listeners behind one trait, a start-all/join-all orchestrator, a LIFO
//! shutdown coordinator and a batched remote log sink.

pub mod config;
pub mod host;
pub mod lifecycle;
pub mod logstore;
pub mod net;
pub mod observability;
pub mod services;

pub use config::schema::SkeletonConfig;
pub use lifecycle::{run_listeners, ShutdownCoordinator};
pub use logstore::LogSink;
pub use net::{Listener, ListenerError};

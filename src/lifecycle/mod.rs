//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Listeners → one task each → register stop hook → join all
//!
//! Shutdown (shutdown.rs):
//!     Trigger fires → hooks run last-in first-out → completion signal
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger of the shutdown sequence
//! ```
//!
//! # Design Decisions
//! - The coordinator is an explicit instance owned by the composition root
//! - Teardown reverses start order, strictly one hook at a time
//! - No deadline on hooks: a hook that never returns stalls shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{ShutdownCoordinator, ShutdownError};
pub use startup::run_listeners;

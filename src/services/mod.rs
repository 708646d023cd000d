//! Services mounted on the listeners by the binary.
//!
//! - `rest`: health and identity endpoints (HTTP and engine listeners)
//! - `stream`: WebSocket echo server (RPC listener)

pub mod rest;
pub mod stream;

pub use rest::router;
pub use stream::EchoStream;

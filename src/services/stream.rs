//! WebSocket echo server.
//!
//! Every text or binary frame is sent back unchanged. Stopping closes the
//! accept loop and aborts open sessions.

use std::net::SocketAddr;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::net::RpcServer;

/// Streaming echo service behind an [`RpcListener`](crate::net::RpcListener).
#[derive(Debug)]
pub struct EchoStream {
    stop: watch::Sender<bool>,
}

impl EchoStream {
    pub fn new() -> Self {
        Self {
            stop: watch::Sender::new(false),
        }
    }
}

impl Default for EchoStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcServer for EchoStream {
    async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let mut stop = self.stop.subscribe();
        let mut sessions = JoinSet::new();

        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    sessions.spawn(echo(stream, peer));
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                // Reap finished sessions so the set does not grow unbounded.
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        }

        sessions.shutdown().await;
        Ok(())
    }

    fn stop(&self) {
        self.stop.send_replace(true);
    }
}

async fn echo(stream: TcpStream, peer: SocketAddr) {
    let mut ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    while let Some(frame) = ws.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "WebSocket session error");
                return;
            }
        };
        if message.is_text() || message.is_binary() {
            if let Err(e) = ws.send(message).await {
                tracing::debug!(peer = %peer, error = %e, "WebSocket send failed");
                return;
            }
        }
    }
}

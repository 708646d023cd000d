//! Run/stop handshake shared by the listener adapters.
//!
//! # Responsibilities
//! - Carry the stop request from `stop` into the serving future
//! - Track whether `run` is idle, serving or finished
//! - Let `stop` wait for `run` to finish within a drain budget
//!
//! # Design Decisions
//! - Two watch channels: late subscribers still observe the current value
//! - A guard marks `run` finished on every exit path, including early `?` returns

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use super::ListenerError;

/// Where the adapter's `run` currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeState {
    /// `run` has not been entered.
    Idle,
    /// `run` is binding or serving.
    Serving,
    /// `run` returned.
    Finished,
}

/// Stop flag plus serve state for one listener.
#[derive(Debug)]
pub struct ServeControl {
    stop_tx: watch::Sender<bool>,
    state_tx: watch::Sender<ServeState>,
}

impl ServeControl {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (state_tx, _) = watch::channel(ServeState::Idle);
        Self { stop_tx, state_tx }
    }

    /// Enter `run`.
    ///
    /// Returns `None` when a stop was requested before `run` started; the caller
    /// must then return [`ListenerError::Closed`] without binding.
    pub fn enter(&self) -> Option<ServeGuard<'_>> {
        self.state_tx.send_replace(ServeState::Serving);
        if self.stop_requested() {
            self.state_tx.send_replace(ServeState::Finished);
            return None;
        }
        Some(ServeGuard { control: self })
    }

    /// Record a stop request. Returns `true` for the first request only.
    pub fn request_stop(&self) -> bool {
        !self.stop_tx.send_replace(true)
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn state(&self) -> ServeState {
        *self.state_tx.borrow()
    }

    /// Future resolving once a stop has been requested.
    pub fn stopped(&self) -> impl Future<Output = ()> + Send + 'static {
        wait_until(self.stop_tx.subscribe(), |stop| *stop)
    }

    /// Wait for `run` to return, failing once `budget` is exhausted.
    ///
    /// Returns immediately when `run` was never entered.
    pub async fn wait_finished(&self, budget: Duration) -> Result<(), ListenerError> {
        if self.state() == ServeState::Idle {
            return Ok(());
        }
        let finished = wait_until(self.state_tx.subscribe(), |state| {
            *state == ServeState::Finished
        });
        tokio::time::timeout(budget, finished)
            .await
            .map_err(|_| ListenerError::DrainTimeout(budget))
    }
}

impl Default for ServeControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the owning listener finished when dropped.
#[derive(Debug)]
pub struct ServeGuard<'a> {
    control: &'a ServeControl,
}

impl Drop for ServeGuard<'_> {
    fn drop(&mut self) {
        self.control.state_tx.send_replace(ServeState::Finished);
    }
}

async fn wait_until<T, F>(mut rx: watch::Receiver<T>, reached: F)
where
    F: Fn(&T) -> bool,
{
    loop {
        let done = reached(&*rx.borrow_and_update());
        if done {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

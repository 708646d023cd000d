//! Shutdown coordination for the process.
//!
//! Hooks are registered by whoever starts something that needs tearing down.
//! When the installed trigger fires, the coordinator runs every hook once, last
//! registered first, one at a time, then fires its completion signal.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::signals::TerminationSignal;
use crate::observability::metrics;

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Errors raised while wiring the shutdown trigger.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// A trigger is already installed on this coordinator.
    #[error("shutdown trigger already installed")]
    AlreadyInstalled,

    /// The OS refused the signal handlers.
    #[error("failed to register signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Default)]
struct HookList {
    pending: Vec<Hook>,
    /// Set once the sequence has taken the list. No appends after that.
    drained: bool,
}

/// Coordinator for graceful shutdown.
///
/// Owned by the composition root and shared by `Arc`. Exactly one trigger can be
/// installed; the hook sequence runs at most once.
pub struct ShutdownCoordinator {
    hooks: Mutex<HookList>,
    installed: AtomicBool,
    done: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no hooks and no trigger.
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self {
            hooks: Mutex::new(HookList::default()),
            installed: AtomicBool::new(false),
            done,
        }
    }

    /// Append a teardown hook.
    ///
    /// Safe to call from many tasks at once. Hooks registered after the sequence
    /// started are dropped with a warning and `false` is returned; whatever the
    /// hook would have torn down must not be started.
    pub fn register<F, Fut>(&self, hook: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut hooks = self.lock_hooks();
        if hooks.drained {
            tracing::warn!("Shutdown already started, hook dropped");
            return false;
        }
        hooks.pending.push(Box::new(move || hook().boxed()));
        true
    }

    /// Whether the hook sequence has taken the list.
    pub fn is_started(&self) -> bool {
        self.lock_hooks().drained
    }

    /// Number of hooks waiting to run.
    pub fn hook_count(&self) -> usize {
        self.lock_hooks().pending.len()
    }

    /// Install SIGINT/SIGTERM as the shutdown trigger.
    pub fn install_signal_handler(self: &Arc<Self>) -> Result<JoinHandle<()>, ShutdownError> {
        self.claim_trigger()?;
        let signal = match TerminationSignal::register() {
            Ok(signal) => signal,
            Err(e) => {
                self.installed.store(false, Ordering::SeqCst);
                return Err(ShutdownError::Signal(e));
            }
        };
        tracing::debug!("Shutdown signal handler installed");

        let coordinator = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let name = signal.recv().await;
            tracing::info!(signal = name, "Shutdown signal received");
            coordinator.run_hooks().await;
        }))
    }

    /// Install an arbitrary future as the shutdown trigger.
    ///
    /// The hook sequence starts when `trigger` resolves.
    pub fn install<T>(self: &Arc<Self>, trigger: T) -> Result<JoinHandle<()>, ShutdownError>
    where
        T: Future<Output = ()> + Send + 'static,
    {
        self.claim_trigger()?;

        let coordinator = Arc::clone(self);
        Ok(tokio::spawn(async move {
            trigger.await;
            coordinator.run_hooks().await;
        }))
    }

    /// Whether the completion signal has fired.
    pub fn is_complete(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait until every hook has run.
    ///
    /// Resolves immediately once the sequence has completed. Never times out.
    pub async fn wait(&self) {
        let mut rx = self.done.subscribe();
        loop {
            let complete = *rx.borrow_and_update();
            if complete || rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn claim_trigger(&self) -> Result<(), ShutdownError> {
        if self.installed.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyInstalled);
        }
        Ok(())
    }

    async fn run_hooks(&self) {
        let hooks = {
            let mut list = self.lock_hooks();
            if list.drained {
                return;
            }
            list.drained = true;
            std::mem::take(&mut list.pending)
        };

        tracing::info!(hooks = hooks.len(), "Start shutdown...");
        let started = Instant::now();

        for (index, hook) in hooks.into_iter().enumerate().rev() {
            let run = async move { hook().await };
            if AssertUnwindSafe(run).catch_unwind().await.is_err() {
                tracing::error!(hook = index, "Shutdown hook panicked");
            }
            metrics::record_shutdown_hook();
        }

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Finish shutdown"
        );
        self.done.send_replace(true);
    }

    fn lock_hooks(&self) -> MutexGuard<'_, HookList> {
        // A panic while holding the lock cannot leave the list half-written.
        self.hooks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("hooks", &self.hook_count())
            .field("installed", &self.installed.load(Ordering::SeqCst))
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_second_install_is_rejected() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let (_tx, rx) = oneshot::channel::<()>();
        coordinator
            .install(async move {
                let _ = rx.await;
            })
            .unwrap();

        let err = coordinator.install(async {}).unwrap_err();
        assert!(matches!(err, ShutdownError::AlreadyInstalled));
    }

    #[tokio::test]
    async fn test_hooks_after_shutdown_are_dropped() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        coordinator.install(async {}).unwrap().await.unwrap();
        assert!(coordinator.is_complete());

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let accepted = coordinator.register(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!accepted);
        assert!(coordinator.is_started());
        assert_eq!(coordinator.hook_count(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_hook_does_not_block_completion() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        coordinator.register(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        coordinator.register(|| async { panic!("hook failure") });

        coordinator.install(async {}).unwrap();
        coordinator.wait().await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_complete());
    }
}

//! Listener orchestration.
//!
//! # Responsibilities
//! - Start every listener on its own task
//! - Register one stop hook per listener with the shutdown coordinator
//! - Join all listeners and report the first fatal error
//!
//! # Design Decisions
//! - A failing listener does not stop its siblings; only the shutdown trigger
//!   tears listeners down
//! - `Closed` after a deliberate stop counts as success
//! - Stop failures are logged and swallowed inside the hook
//! - Listeners whose stop hook is rejected (shutdown already running) are not started

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{JoinError, JoinSet};

use super::shutdown::ShutdownCoordinator;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Run all `listeners` until every one of them has returned.
///
/// Returns the first non-benign error in completion order, or `Ok(())` when all
/// listeners ended cleanly.
pub async fn run_listeners<I>(shutdown: &ShutdownCoordinator, listeners: I) -> Result<(), ListenerError>
where
    I: IntoIterator<Item = Box<dyn Listener>>,
{
    let mut tasks = JoinSet::new();
    let mut names = HashMap::new();

    for listener in listeners {
        let listener: Arc<dyn Listener> = Arc::from(listener);
        let name = listener.name();

        // Register before spawning: a listener nobody can stop must not run.
        let stopper = Arc::clone(&listener);
        let hook_name = name.clone();
        let registered = shutdown.register(move || async move {
            tracing::debug!(listener = %hook_name, "Shutdown...");
            match stopper.stop().await {
                Ok(()) => tracing::debug!(listener = %hook_name, "Stopped"),
                Err(e) => tracing::warn!(listener = %hook_name, error = %e, "Fail to shutdown"),
            }
        });
        if !registered {
            tracing::warn!(listener = %name, "Shutdown already started, listener not started");
            metrics::record_listener_exit(&name, "skipped");
            continue;
        }

        let task_name = name.clone();
        let handle = tasks.spawn(async move {
            tracing::debug!(listener = %task_name, "Listening ...");
            let outcome = listener.run().await;
            (task_name, outcome)
        });
        names.insert(handle.id(), name);
    }

    tracing::info!(listeners = tasks.len(), "Listeners started");

    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let (name, outcome) = match joined {
            Ok(finished) => finished,
            Err(e) => {
                let name = names.get(&e.id()).cloned().unwrap_or_default();
                let error = join_failure(&name, &e);
                (name, Err(error))
            }
        };

        match outcome {
            Ok(()) | Err(ListenerError::Closed) => {
                metrics::record_listener_exit(&name, "closed");
                tracing::debug!(listener = %name, "Listener finished");
            }
            Err(e) => {
                metrics::record_listener_exit(&name, "failed");
                tracing::error!(listener = %name, error = %e, "Listener failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Error for a listener task that did not return normally.
fn join_failure(name: &str, err: &JoinError) -> ListenerError {
    if err.is_panic() {
        ListenerError::Panicked(name.to_string())
    } else {
        ListenerError::Other(format!("listener task cancelled: {}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_task_is_not_a_panic() {
        let task = tokio::spawn(std::future::pending::<()>());
        task.abort();
        let err = task.await.unwrap_err();

        match join_failure("rest", &err) {
            ListenerError::Other(message) => assert!(message.contains("cancelled")),
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicked_task_keeps_its_name() {
        let err = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        assert!(matches!(join_failure("rest", &err), ListenerError::Panicked(name) if name == "rest"));
    }
}

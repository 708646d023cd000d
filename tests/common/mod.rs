//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use service_skeleton::logstore::{LogGroup, LogStore, LogStoreError};
use service_skeleton::net::{Listener, ListenerError};

/// Reserve a loopback port that is free right now.
pub fn free_addr() -> SocketAddr {
    let socket = StdTcpListener::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}

/// Poll `url` until it answers or two seconds have passed.
pub async fn wait_until_serving(url: &str) -> reqwest::Response {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match reqwest::get(url).await {
            Ok(response) => return response,
            Err(e) if tokio::time::Instant::now() >= deadline => {
                panic!("{} never came up: {}", url, e)
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
}

/// What a [`ScriptedListener`] does when run.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Block until `stop`, then return `Closed`.
    UntilStopped,
    /// Return a serve error after the delay.
    FailAfter(Duration),
    /// Return `Ok` after the delay.
    ReturnAfter(Duration),
    /// Panic inside `run`.
    Panic,
}

/// Listener double driven by a [`Script`].
pub struct ScriptedListener {
    name: String,
    script: Script,
    stop: watch::Sender<bool>,
    finished: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
    stop_result: fn() -> Result<(), ListenerError>,
}

impl ScriptedListener {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            stop: watch::Sender::new(false),
            finished: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
            stop_result: || Ok(()),
        }
    }

    /// Share a counter incremented each time `run` returns.
    pub fn counting_finishes(mut self, finished: &Arc<AtomicUsize>) -> Self {
        self.finished = Arc::clone(finished);
        self
    }

    /// Share a counter incremented on each `stop`.
    pub fn counting_stops(mut self, stops: &Arc<AtomicUsize>) -> Self {
        self.stops = Arc::clone(stops);
        self
    }

    /// Make `stop` fail with a drain timeout after stopping the run.
    pub fn failing_stop(mut self) -> Self {
        self.stop_result = || Err(ListenerError::DrainTimeout(Duration::from_millis(1)));
        self
    }

    pub fn boxed(self) -> Box<dyn Listener> {
        Box::new(self)
    }
}

#[async_trait]
impl Listener for ScriptedListener {
    fn name(&self) -> String {
        format!("scripted (in-memory), {}", self.name)
    }

    async fn run(&self) -> Result<(), ListenerError> {
        let outcome = match self.script {
            Script::UntilStopped => {
                let mut stop = self.stop.subscribe();
                while !*stop.borrow_and_update() {
                    if stop.changed().await.is_err() {
                        break;
                    }
                }
                Err(ListenerError::Closed)
            }
            Script::FailAfter(delay) => {
                tokio::time::sleep(delay).await;
                Err(ListenerError::Serve(std::io::Error::other("scripted failure")))
            }
            Script::ReturnAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Script::Panic => panic!("scripted panic"),
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    async fn stop(&self) -> Result<(), ListenerError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.stop.send_replace(true);
        (self.stop_result)()
    }
}

/// In-memory [`LogStore`] recording every accepted group.
#[derive(Default)]
pub struct MemoryStore {
    accepted: Mutex<Vec<LogGroup>>,
    attempts: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    reject_batches: bool,
    poison: Option<String>,
    delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every put carrying more than one entry.
    pub fn rejecting_batches(mut self) -> Self {
        self.reject_batches = true;
        self
    }

    /// Reject every put containing an entry with this message.
    pub fn poisoned_by(mut self, message: &str) -> Self {
        self.poison = Some(message.to_string());
        self
    }

    /// Sleep this long before answering each put.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn accepted(&self) -> Vec<LogGroup> {
        self.accepted.lock().unwrap().clone()
    }

    /// Messages of all accepted entries, in acceptance order.
    pub fn messages(&self) -> Vec<String> {
        self.accepted()
            .iter()
            .flat_map(|group| group.logs.iter())
            .filter_map(|entry| entry.get("message").map(str::to_string))
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Highest number of puts that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, group: &LogGroup) -> Result<(), LogStoreError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        if self.reject_batches && group.logs.len() > 1 {
            return Err(LogStoreError::Rejected(413));
        }
        if let Some(poison) = &self.poison {
            if group.logs.iter().any(|e| e.get("message") == Some(poison.as_str())) {
                return Err(LogStoreError::Rejected(400));
            }
        }
        self.accepted.lock().unwrap().push(group.clone());
        Ok(())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put_logs(&self, group: &LogGroup) -> Result<(), LogStoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        // Timed-out puts are dropped mid-answer.
        let _in_flight = InFlight(&self.in_flight);

        self.answer(group).await
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

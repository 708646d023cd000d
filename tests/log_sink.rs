//! Batched remote log sink behavior against an in-memory store.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::MemoryStore;
use service_skeleton::lifecycle::ShutdownCoordinator;
use service_skeleton::logstore::{FlushPolicy, FlushReport, LogRecord, LogSink, Severity};

fn policy(batch_size: usize, interval: Duration) -> FlushPolicy {
    FlushPolicy {
        batch_size,
        interval,
        put_timeout: Duration::from_millis(500),
    }
}

fn sink_for(store: &Arc<MemoryStore>, policy: FlushPolicy) -> LogSink {
    LogSink::new(store.clone(), "skeleton", "10.0.0.7").with_policy(policy)
}

fn record(message: &str) -> LogRecord {
    LogRecord::new(Severity::Info, message)
}

#[tokio::test]
async fn test_batch_flushes_exactly_at_batch_size() {
    let store = Arc::new(MemoryStore::new());
    let sink = sink_for(&store, policy(3, Duration::from_secs(60)));

    assert_eq!(sink.fire(record("m0")).await, None);
    assert_eq!(sink.fire(record("m1")).await, None);
    assert_eq!(store.attempts(), 0);
    assert_eq!(sink.pending().await, 2);

    let report = sink.fire(record("m2")).await.expect("third record flushes");
    assert_eq!(
        report,
        FlushReport {
            records: 3,
            batched: true,
            delivered: 3,
            discarded: 0,
        }
    );
    assert_eq!(sink.pending().await, 0);

    let groups = store.accepted();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].topic, "skeleton");
    assert_eq!(groups[0].source, "10.0.0.7");
    assert_eq!(store.messages(), vec!["m0", "m1", "m2"]);
}

#[tokio::test(start_paused = true)]
async fn test_lone_record_is_shipped_by_the_ticker() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(sink_for(&store, policy(100, Duration::from_secs(3))));
    let coordinator = ShutdownCoordinator::new();
    let ticker = sink.spawn_flusher(&coordinator);

    assert_eq!(sink.fire(record("alone")).await, None);

    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert_eq!(store.attempts(), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.messages(), vec!["alone"]);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(store.attempts(), 1);
    ticker.abort();
}

#[tokio::test(start_paused = true)]
async fn test_interval_makes_unforced_flush_due() {
    let store = Arc::new(MemoryStore::new());
    let sink = sink_for(&store, policy(100, Duration::from_secs(3)));

    sink.fire(record("waiting")).await;
    assert_eq!(sink.flush(false).await, None);

    tokio::time::advance(Duration::from_secs(3)).await;
    let report = sink.flush(false).await.expect("interval elapsed");
    assert_eq!(report.records, 1);
    assert_eq!(store.messages(), vec!["waiting"]);
}

#[tokio::test(start_paused = true)]
async fn test_record_after_quiet_period_flushes_on_fire() {
    let store = Arc::new(MemoryStore::new());
    let sink = sink_for(&store, policy(100, Duration::from_secs(3)));

    tokio::time::advance(Duration::from_secs(5)).await;
    let report = sink.fire(record("late")).await.expect("interval already elapsed");
    assert!(report.batched);
    assert_eq!(store.attempts(), 1);
}

#[tokio::test]
async fn test_failed_batch_falls_back_to_single_puts() {
    let store = Arc::new(MemoryStore::new().rejecting_batches().poisoned_by("m2"));
    let sink = sink_for(&store, policy(5, Duration::from_secs(60)));

    for i in 0..4 {
        assert_eq!(sink.fire(record(&format!("m{}", i))).await, None);
    }
    let report = sink.fire(record("m4")).await.expect("batch full");

    assert_eq!(
        report,
        FlushReport {
            records: 5,
            batched: false,
            delivered: 4,
            discarded: 1,
        }
    );
    assert_eq!(sink.pending().await, 0);
    assert_eq!(store.attempts(), 6);
    assert_eq!(store.messages(), vec!["m0", "m1", "m3", "m4"]);
    assert!(store.accepted().iter().all(|group| group.logs.len() == 1));
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out_and_discards() {
    let store = Arc::new(MemoryStore::new().slow(Duration::from_secs(1)));
    let sink = sink_for(&store, policy(2, Duration::from_secs(60)));

    sink.fire(record("a")).await;
    let report = sink.fire(record("b")).await.expect("batch full");

    assert!(!report.batched);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.discarded, 2);
    assert_eq!(store.attempts(), 3);
    assert_eq!(sink.pending().await, 0);
}

#[tokio::test]
async fn test_static_fields_never_override_record_fields() {
    let store = Arc::new(MemoryStore::new());
    let extra = BTreeMap::from([
        ("region".to_string(), "eu-west".to_string()),
        ("user".to_string(), "static".to_string()),
        ("message".to_string(), "from extra".to_string()),
        ("level".to_string(), "0".to_string()),
    ]);
    let sink = sink_for(&store, policy(100, Duration::from_secs(60))).with_extra(extra);

    sink.fire(LogRecord::new(Severity::Warn, "hello").with_field("user", "alice"))
        .await;
    sink.flush(true).await.expect("forced flush");

    let groups = store.accepted();
    let entry = &groups[0].logs[0];
    assert_eq!(entry.get("message"), Some("hello"));
    assert_eq!(entry.get("level"), Some("4"));
    assert_eq!(entry.get("user"), Some("alice"));
    assert_eq!(entry.get("region"), Some("eu-west"));
}

#[tokio::test]
async fn test_forced_flush_of_empty_buffer_is_noop() {
    let store = Arc::new(MemoryStore::new());
    let sink = sink_for(&store, policy(1, Duration::ZERO));

    assert_eq!(sink.flush(true).await, None);
    assert_eq!(sink.flush(false).await, None);
    assert_eq!(store.attempts(), 0);
}

#[tokio::test]
async fn test_shutdown_hook_flushes_remaining_records() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(sink_for(&store, policy(100, Duration::from_secs(60))));
    let coordinator = Arc::new(ShutdownCoordinator::new());
    let (trigger, fired) = tokio::sync::oneshot::channel::<()>();
    coordinator
        .install(async move {
            let _ = fired.await;
        })
        .unwrap();

    let ticker = sink.spawn_flusher(&coordinator);
    sink.fire(record("last words")).await;
    assert_eq!(store.attempts(), 0);

    trigger.send(()).unwrap();
    coordinator.wait().await;

    assert_eq!(store.messages(), vec!["last words"]);
    assert!(ticker.await.unwrap_err().is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fires_never_overlap_puts() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(sink_for(&store, policy(7, Duration::from_secs(60))));

    let writers: Vec<_> = (0..100)
        .map(|i| {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { sink.fire(record(&format!("r{}", i))).await })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }
    sink.flush(true).await;

    assert_eq!(store.peak_in_flight(), 1);
    assert_eq!(sink.pending().await, 0);

    let mut delivered = store.messages();
    delivered.sort();
    let mut expected: Vec<String> = (0..100).map(|i| format!("r{}", i)).collect();
    expected.sort();
    assert_eq!(delivered, expected);
}

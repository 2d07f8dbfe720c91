// Scheduler control and bookkeeping. Cycles are driven through run_once or
// run_on_start so no test waits for a real wall-clock boundary.

use serde_json::json;
use std::time::Duration;
use tesla_telemetry::ingest::{FailureReason, IngestOutcome};
use tesla_telemetry::scheduler::IngestionScheduler;
use test_helpers::*;


async fn wait_for_result(scheduler: &IngestionScheduler) -> IngestOutcome {
    for _ in 0..200 {
        if let Some(result) = scheduler.status().last_result {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scheduler never recorded a result");
}

#[tokio::test]
async fn test_start_twice_is_noop() {
    let scheduler = IngestionScheduler::new(
        pipeline(MemoryStore::new(), ScriptedSource::new(vec![])),
        5,
        false,
    );

    assert!(scheduler.start());
    assert!(!scheduler.start());
    assert!(scheduler.is_running());

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let scheduler = IngestionScheduler::new(
        pipeline(MemoryStore::new(), ScriptedSource::new(vec![])),
        5,
        false,
    );

    assert!(!scheduler.stop());
    scheduler.start();
    assert!(scheduler.stop());
    assert!(!scheduler.stop());
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn test_status_reports_next_boundary_while_running() {
    let scheduler = IngestionScheduler::new(
        pipeline(MemoryStore::new(), ScriptedSource::new(vec![])),
        5,
        false,
    );

    let idle = scheduler.status();
    assert!(!idle.running);
    assert_eq!(idle.interval_minutes, 5);
    assert!(idle.next_run_time.is_none());
    assert!(idle.last_run_time.is_none());

    scheduler.start();
    let mut next = None;
    for _ in 0..200 {
        next = scheduler.status().next_run_time;
        if next.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let next = next.expect("next_run_time set while running");
    assert!(next <= chrono::Utc::now() + chrono::Duration::minutes(5));
    assert_eq!(next.timestamp() % 300, 0);

    scheduler.shutdown().await;
    let stopped = scheduler.status();
    assert!(!stopped.running);
    assert!(stopped.next_run_time.is_none());
}

#[tokio::test]
async fn test_run_once_records_result() {
    let store = MemoryStore::new();
    let source = ScriptedSource::new(vec![Step::Snapshot(payload(json!({"data_id": 3})))]);
    let scheduler = IngestionScheduler::new(pipeline(store.clone(), source), 5, false);

    let outcome = scheduler.run_once().await;
    assert_eq!(outcome, IngestOutcome::Success { external_id: 3 });

    let status = scheduler.status();
    assert_eq!(status.last_result, Some(outcome));
    assert!(status.last_run_time.is_some());
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn test_failed_cycle_does_not_stop_loop() {
    let store = MemoryStore::new();
    let source = ScriptedSource::new(vec![Step::Fail("connection refused".into())]);
    let scheduler = IngestionScheduler::new(pipeline(store.clone(), source.clone()), 5, true);

    scheduler.start();
    let result = wait_for_result(&scheduler).await;

    assert!(matches!(
        result,
        IngestOutcome::Error {
            reason: FailureReason::Upstream,
            ..
        }
    ));
    assert!(scheduler.is_running());
    assert_eq!(source.calls(), 1);
    assert!(store.rows().is_empty());

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_panicking_cycle_becomes_error_outcome() {
    let source = ScriptedSource::new(vec![
        Step::Panic,
        Step::Snapshot(payload(json!({"data_id": 9}))),
    ]);
    let scheduler = IngestionScheduler::new(pipeline(MemoryStore::new(), source), 5, false);

    let crashed = scheduler.run_once().await;
    assert!(matches!(
        crashed,
        IngestOutcome::Error {
            reason: FailureReason::Internal,
            ..
        }
    ));

    // the scheduler keeps working afterwards
    assert_eq!(
        scheduler.run_once().await,
        IngestOutcome::Success { external_id: 9 }
    );
}

#[tokio::test]
async fn test_manual_and_scheduled_runs_share_dedup() {
    let store = MemoryStore::new();
    let source = ScriptedSource::new(vec![
        Step::Snapshot(payload(json!({"data_id": 21}))),
        Step::Snapshot(payload(json!({"data_id": 21}))),
    ]);
    let scheduler = IngestionScheduler::new(pipeline(store.clone(), source), 5, true);

    scheduler.start();
    wait_for_result(&scheduler).await;
    let manual = scheduler.run_once().await;

    assert_eq!(manual, IngestOutcome::Duplicate { external_id: 21 });
    assert_eq!(store.rows().len(), 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_restart_after_stop() {
    let scheduler = IngestionScheduler::new(
        pipeline(MemoryStore::new(), ScriptedSource::new(vec![])),
        1,
        false,
    );

    assert!(scheduler.start());
    scheduler.shutdown().await;
    assert!(scheduler.start());
    assert!(scheduler.is_running());
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_stop_lets_in_flight_cycle_finish() {
    let store = MemoryStore::new();
    let source = ScriptedSource::new(vec![Step::Slow(
        Duration::from_millis(200),
        payload(json!({"data_id": 31})),
    )]);
    let scheduler = IngestionScheduler::new(pipeline(store.clone(), source.clone()), 5, true);

    scheduler.start();
    for _ in 0..200 {
        if source.calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(source.calls(), 1, "cycle should be in flight");
    assert!(scheduler.status().last_result.is_none());

    assert!(scheduler.stop());
    assert!(!scheduler.is_running());

    let result = wait_for_result(&scheduler).await;
    assert_eq!(result, IngestOutcome::Success { external_id: 31 });
    assert_eq!(store.rows().len(), 1);
    assert!(scheduler.status().last_run_time.is_some());
}

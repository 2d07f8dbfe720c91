// Normalization & store behaviour against the in-memory store.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tesla_telemetry::ingest::{FailureReason, IngestOutcome, Ingestor};
use tesla_telemetry::models::ReadingView;
use test_helpers::*;


fn ingestor(store: &std::sync::Arc<MemoryStore>) -> Ingestor {
    Ingestor::new(store.clone(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_missing_identifier_is_rejected_without_write() {
    let store = MemoryStore::new();
    let ingestor = ingestor(&store);

    for p in [
        json!({"battery_level": 80}),
        json!({"data_id": null, "battery_level": 80}),
        json!({"data_id": "", "battery_level": 80}),
        json!({"data_id": "null"}),
        json!({"data_id": "abc"}),
    ] {
        let outcome = ingestor.ingest(&payload(p)).await;
        assert!(
            matches!(
                outcome,
                IngestOutcome::Error {
                    reason: FailureReason::InvalidPayload,
                    external_id: None,
                    ..
                }
            ),
            "unexpected outcome {:?}",
            outcome
        );
    }
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_duplicate_leaves_row_unchanged() {
    let store = MemoryStore::new();
    let ingestor = ingestor(&store);

    let first = ingestor
        .ingest(&payload(json!({"data_id": 7, "battery_level": "50"})))
        .await;
    assert_eq!(first, IngestOutcome::Success { external_id: 7 });
    let before = store.rows();

    let second = ingestor
        .ingest(&payload(json!({"data_id": "7", "battery_level": "99"})))
        .await;
    assert_eq!(second, IngestOutcome::Duplicate { external_id: 7 });
    assert_eq!(store.rows(), before);
    assert_eq!(store.rows()[0].battery_level, Some(50.0));
}

#[tokio::test]
async fn test_same_payload_twice_stores_one_row() {
    let store = MemoryStore::new();
    let ingestor = ingestor(&store);
    let p = payload(json!({"data_id": 11, "odometer": 1234.5}));

    ingestor.ingest(&p).await;
    ingestor.ingest(&p).await;

    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn test_concurrent_ingest_stores_one_row() {
    let store = MemoryStore::new();
    let ingestor = ingestor(&store);
    let p = payload(json!({"data_id": 12}));

    let (a, b) = tokio::join!(ingestor.ingest(&p), ingestor.ingest(&p));

    let mut statuses = vec![a, b];
    statuses.sort_by_key(|o| matches!(o, IngestOutcome::Duplicate { .. }));
    assert_eq!(statuses[0], IngestOutcome::Success { external_id: 12 });
    assert_eq!(statuses[1], IngestOutcome::Duplicate { external_id: 12 });
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn test_scenario_42_coerces_and_converts_on_read() {
    let store = MemoryStore::new();
    let ingestor = ingestor(&store);

    let outcome = ingestor
        .ingest(&payload(json!({
            "data_id": 42,
            "battery_level": "85.5",
            "locked": "true",
            "tpms_front_left": "42.0",
            "some_unknown_field": "ignored"
        })))
        .await;
    assert_eq!(outcome, IngestOutcome::Success { external_id: 42 });

    let rows = store.rows();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.external_id, 42);
    assert_eq!(row.battery_level, Some(85.5));
    assert_eq!(row.locked, Some(true));
    // stored in source units
    assert_eq!(row.tpms_front_left, Some(42.0));

    let view = ReadingView::from(row.clone());
    let bar = view.tpms_front_left_bar.unwrap();
    assert!((bar - 2.895).abs() < 0.001, "got {}", bar);
}

#[tokio::test]
async fn test_storage_failure_is_reported() {
    let store = MemoryStore::new();
    store.set_failing(true);
    let ingestor = ingestor(&store);

    let outcome = ingestor.ingest(&payload(json!({"data_id": 5}))).await;
    match outcome {
        IngestOutcome::Error {
            external_id,
            reason,
            message,
        } => {
            assert_eq!(external_id, Some(5));
            assert_eq!(reason, FailureReason::Storage);
            assert!(!message.is_empty());
        }
        other => panic!("expected storage error, got {:?}", other),
    }
    store.set_failing(false);
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_insert_conflict_after_missed_lookup_is_duplicate() {
    let store = MemoryStore::new();
    let ingestor = ingestor(&store);
    ingestor.ingest(&payload(json!({"data_id": 77}))).await;

    store.set_hide_existing(true);
    let outcome = ingestor.ingest(&payload(json!({"data_id": 77}))).await;

    assert_eq!(outcome, IngestOutcome::Duplicate { external_id: 77 });
    assert_eq!(store.rows().len(), 1);
}

#[tokio::test]
async fn test_run_once_upstream_failure_skips_store() {
    let store = MemoryStore::new();
    let source = ScriptedSource::new(vec![Step::Fail("HTTP 503 Service Unavailable".into())]);
    let pipeline = pipeline(store.clone(), source.clone());

    let outcome = pipeline.run_once().await;

    assert!(matches!(
        outcome,
        IngestOutcome::Error {
            reason: FailureReason::Upstream,
            ..
        }
    ));
    assert_eq!(source.calls(), 1);
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_run_once_stores_fetched_snapshot() {
    let store = MemoryStore::new();
    let source = ScriptedSource::new(vec![
        Step::Snapshot(payload(json!({"data_id": 100, "Date": "2024-06-01 10:00:00"}))),
        Step::Snapshot(payload(json!({"data_id": 100}))),
    ]);
    let pipeline = pipeline(store.clone(), source);

    assert_eq!(
        pipeline.run_once().await,
        IngestOutcome::Success { external_id: 100 }
    );
    assert_eq!(
        pipeline.run_once().await,
        IngestOutcome::Duplicate { external_id: 100 }
    );
    assert_eq!(
        store.rows()[0].vendor_date.as_deref(),
        Some("2024-06-01 10:00:00")
    );
}

#[tokio::test]
async fn test_run_once_local_fetch_error_is_internal() {
    let store = MemoryStore::new();
    let source = ScriptedSource::new(vec![Step::Misconfigured(
        "invalid teslafi base_url".into(),
    )]);
    let pipeline = pipeline(store.clone(), source);

    let outcome = pipeline.run_once().await;

    assert!(matches!(
        outcome,
        IngestOutcome::Error {
            reason: FailureReason::Internal,
            external_id: None,
            ..
        }
    ));
    assert!(store.rows().is_empty());
}

#[tokio::test]
async fn test_slow_acknowledgement_after_commit_is_still_success() {
    let store = MemoryStore::new();
    store.set_post_commit_delay(Duration::from_millis(150));
    let ingestor = Ingestor::new(store.clone(), Duration::from_millis(50));

    let outcome = ingestor.ingest(&payload(json!({"data_id": 64}))).await;

    assert_eq!(outcome, IngestOutcome::Success { external_id: 64 });
    assert_eq!(store.rows().len(), 1);
}

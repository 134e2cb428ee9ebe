//! End-to-end checker invocations over an in-memory store.

mod common;

use std::sync::Arc;

use batchwatch_core::models::{BatchFailure, RequestCounts};
use batchwatch_core::orchestration::{Checker, CompletionReporter, Trigger};
use batchwatch_core::state_machine::{BatchEvent, BatchState};
use chrono::Utc;

use common::{in_progress_record, memory_store, MockBatchApi, PollScript, RecordingStarter};

fn checker_with(
    store: Arc<batchwatch_core::storage::StatusStore>,
    api: Arc<MockBatchApi>,
    starter: Arc<RecordingStarter>,
) -> Checker {
    let trigger = Trigger::new(store.clone(), starter);
    Checker::new(store, api, trigger)
}

#[tokio::test]
async fn completed_batch_is_detected_and_triggered_once() {
    let store = memory_store();
    store.register(in_progress_record("ep1", "b1")).await.unwrap();

    let api = Arc::new(MockBatchApi::new());
    api.script("b1", PollScript::Completed);
    let starter = Arc::new(RecordingStarter::new());
    let checker = checker_with(store.clone(), api.clone(), starter.clone());

    let report = checker.run().await.unwrap();
    assert_eq!(report.records_seen, 1);
    assert_eq!(report.polled, 1);
    assert_eq!(report.completed, 1);
    assert_eq!(report.triggered, 1);

    let record = store.get_record("ep1").await.unwrap().unwrap();
    assert_eq!(record.status, BatchState::Triggered);
    assert!(record.completed_at.is_some());
    assert!(record.triggered_at.is_some());

    // Exactly one pipeline start, carrying the record's launch parameters
    let starts = starter.starts();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].project_key, "ep1");
    assert_eq!(starts[0].output_dir, "output/ep1");
    assert_eq!(starts[0].model_name, "claude");
}

#[tokio::test]
async fn transient_api_error_leaves_record_unchanged_and_continues() {
    let store = memory_store();
    store.register(in_progress_record("ep1", "b1")).await.unwrap();
    store.register(in_progress_record("ep2", "b2")).await.unwrap();

    let api = Arc::new(MockBatchApi::new());
    api.script("b1", PollScript::TransientError);
    api.script("b2", PollScript::Completed);
    let starter = Arc::new(RecordingStarter::new());
    let checker = checker_with(store.clone(), api.clone(), starter.clone());

    let report = checker.run().await.unwrap();
    assert_eq!(report.api_errors, 1);
    assert_eq!(report.completed, 1);

    // ep1 untouched, ep2 processed despite ep1's failure
    let ep1 = store.get_record("ep1").await.unwrap().unwrap();
    assert_eq!(ep1.status, BatchState::InProgress);
    assert!(ep1.last_checked_at.is_none());
    let ep2 = store.get_record("ep2").await.unwrap().unwrap();
    assert_eq!(ep2.status, BatchState::Triggered);
    assert_eq!(starter.start_count(), 1);
}

#[tokio::test]
async fn pending_batch_gets_a_progress_touch() {
    let store = memory_store();
    store.register(in_progress_record("ep1", "b1")).await.unwrap();

    let api = Arc::new(MockBatchApi::new());
    api.script(
        "b1",
        PollScript::Pending(Some(RequestCounts {
            total: 50,
            completed: 20,
            failed: 1,
        })),
    );
    let starter = Arc::new(RecordingStarter::new());
    let checker = checker_with(store.clone(), api, starter.clone());

    let report = checker.run().await.unwrap();
    assert_eq!(report.polled, 1);
    assert_eq!(report.completed, 0);

    let record = store.get_record("ep1").await.unwrap().unwrap();
    assert_eq!(record.status, BatchState::InProgress);
    assert!(record.last_checked_at.is_some());
    assert_eq!(record.request_counts.unwrap().completed, 20);
    assert_eq!(starter.start_count(), 0);
}

#[tokio::test]
async fn failed_batch_is_marked_failed_with_detail() {
    let store = memory_store();
    store.register(in_progress_record("ep1", "b1")).await.unwrap();

    let api = Arc::new(MockBatchApi::new());
    api.script("b1", PollScript::Failed("expired".to_string()));
    let starter = Arc::new(RecordingStarter::new());
    let checker = checker_with(store.clone(), api, starter.clone());

    let report = checker.run().await.unwrap();
    assert_eq!(report.failed, 1);

    let record = store.get_record("ep1").await.unwrap().unwrap();
    assert_eq!(record.status, BatchState::Failed);
    assert_eq!(record.error.as_ref().unwrap().reason, "expired");
    assert!(record.finished_at.is_some());
    assert_eq!(starter.start_count(), 0);
}

#[tokio::test]
async fn completed_but_untriggered_record_is_swept_before_polling() {
    let store = memory_store();
    // A previous invocation completed ep1 but crashed before triggering
    let mut record = in_progress_record("ep1", "b1");
    record.apply(&BatchEvent::MarkCompleted, Utc::now()).unwrap();
    store.register(record).await.unwrap();

    let api = Arc::new(MockBatchApi::new());
    let starter = Arc::new(RecordingStarter::new());
    let checker = checker_with(store.clone(), api.clone(), starter.clone());

    let report = checker.run().await.unwrap();
    assert_eq!(report.triggered, 1);
    // The sweep handles it; the API is never asked about a completed record
    assert!(api.polled().is_empty());

    let record = store.get_record("ep1").await.unwrap().unwrap();
    assert_eq!(record.status, BatchState::Triggered);
    assert_eq!(starter.start_count(), 1);
}

#[tokio::test]
async fn start_failure_leaves_record_triggered_and_is_not_retried_inline() {
    let store = memory_store();
    let mut record = in_progress_record("ep1", "b1");
    record.apply(&BatchEvent::MarkCompleted, Utc::now()).unwrap();
    store.register(record).await.unwrap();

    let api = Arc::new(MockBatchApi::new());
    let starter = Arc::new(RecordingStarter::new());
    starter.fail_next(1);
    let checker = checker_with(store.clone(), api, starter.clone());

    let report = checker.run().await.unwrap();
    assert_eq!(report.trigger_start_failures, 1);
    assert!(!report.is_clean());
    assert_eq!(starter.start_count(), 0);

    // The accepted partial failure: state says triggered, nothing runs.
    // A re-run does not re-trigger (the record is no longer completed).
    let record = store.get_record("ep1").await.unwrap().unwrap();
    assert_eq!(record.status, BatchState::Triggered);

    let checker2 = checker_with(store.clone(), Arc::new(MockBatchApi::new()), starter.clone());
    let report2 = checker2.run().await.unwrap();
    assert_eq!(report2.triggered, 0);
    assert_eq!(starter.start_count(), 0);
}

#[tokio::test]
async fn rerun_over_terminal_records_changes_nothing() {
    let store = memory_store();

    // Drive one record to done through the full lifecycle
    store.register(in_progress_record("ep1", "b1")).await.unwrap();
    let api = Arc::new(MockBatchApi::new());
    api.script("b1", PollScript::Completed);
    let starter = Arc::new(RecordingStarter::new());
    let checker = checker_with(store.clone(), api, starter.clone());
    checker.run().await.unwrap();
    CompletionReporter::new(store.clone())
        .report_done("ep1")
        .await
        .unwrap();

    // And one failed record
    let mut failed = in_progress_record("ep2", "b2");
    failed
        .apply(
            &BatchEvent::MarkFailed(BatchFailure::new("cancelled", "operator cancelled")),
            Utc::now(),
        )
        .unwrap();
    store.register(failed).await.unwrap();

    let (before, _) = store.load().await.unwrap();

    // Idempotence: re-running over an all-terminal document is a no-op
    let api = Arc::new(MockBatchApi::new());
    let starter2 = Arc::new(RecordingStarter::new());
    let checker = checker_with(store.clone(), api.clone(), starter2.clone());
    let report = checker.run().await.unwrap();

    assert_eq!(report.polled, 0);
    assert_eq!(report.triggered, 0);
    assert!(api.polled().is_empty());
    assert_eq!(starter2.start_count(), 0);

    let (after, _) = store.load().await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn empty_store_is_a_clean_noop() {
    let store = memory_store();
    let api = Arc::new(MockBatchApi::new());
    let starter = Arc::new(RecordingStarter::new());
    let checker = checker_with(store, api, starter);

    let report = checker.run().await.unwrap();
    assert_eq!(report.records_seen, 0);
    assert!(report.is_clean());
}

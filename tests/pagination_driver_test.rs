//! End-to-end pagination runs against a scripted history

mod common;

use common::{cursor, event_ids, event_ids_in, history, RecordingProgress, ScriptedFetcher, NEWEST_TS};
use roomsweep::pagination::{
    CheckpointStore, FetchError, FileCheckpointStore, NdjsonPersister, PaginationDriver,
    PaginationError, PaginationOptions, RetryPolicy, ShutdownSignal,
};
use roomsweep::storage::RoomStorage;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const ROOM: &str = "!room:example.org";

fn persister(storage: &RoomStorage) -> NdjsonPersister<FileCheckpointStore> {
    NdjsonPersister::new(
        storage.messages_dir(),
        FileCheckpointStore::new(storage.resume_file()),
    )
}

fn stored_checkpoint(storage: &RoomStorage) -> Option<String> {
    let raw = std::fs::read_to_string(storage.resume_file()).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    value["from"].as_str().map(str::to_string)
}

#[tokio::test]
async fn test_artifacts_concatenate_to_history() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);
    let events = history(250);

    let driver = PaginationDriver::new(
        ScriptedFetcher::new(events.clone()),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(100).with_flush_interval(1),
    );
    let report = driver.run(None).await.unwrap();

    assert_eq!(report.requests, 3);
    assert_eq!(report.records, 250);
    assert_eq!(report.flushes, 3);
    assert!(!report.interrupted);
    assert_eq!(event_ids_in(&report.artifacts), event_ids(&events));
    assert_eq!(report.checkpoint, Some(cursor(250)));
    assert_eq!(stored_checkpoint(&storage), Some(cursor(250)));

    let names: Vec<_> = report
        .artifacts
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "start_t0__end_t100.ndjson",
            "start_t100__end_t200.ndjson",
            "start_t200__end_t250.ndjson"
        ]
    );
}

#[tokio::test]
async fn test_resume_never_re_emits_records() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);
    let events = history(300);

    // first run dies on its second request
    let first = PaginationDriver::new(
        ScriptedFetcher::new(events.clone())
            .with_script(vec![None, Some(FetchError::fatal("M_FORBIDDEN"))]),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(100).with_flush_interval(1),
    );
    let err = first.run(None).await.unwrap_err();
    assert!(matches!(err, PaginationError::Fatal { requests: 1, .. }));
    assert_eq!(err.completed_requests(), 1);
    assert_eq!(stored_checkpoint(&storage), Some(cursor(100)));

    let second = PaginationDriver::new(
        ScriptedFetcher::new(events.clone()),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(100).with_flush_interval(1),
    );
    let report = second.resume().await.unwrap();

    let calls = second.fetcher().calls();
    assert_eq!(calls.first().cloned().flatten(), Some(cursor(100)));
    assert!(!calls.contains(&None));
    assert!(!calls.contains(&Some(cursor(0))));

    let mut artifacts = vec![storage.messages_dir().join("start_t0__end_t100.ndjson")];
    artifacts.extend(report.artifacts.iter().cloned());
    assert_eq!(event_ids_in(&artifacts), event_ids(&events));
    // the terminal empty page leaves the checkpoint at the last real cursor
    assert_eq!(stored_checkpoint(&storage), Some(cursor(300)));
}

#[tokio::test]
async fn test_terminal_page_inside_flush_interval_checkpoints_last_real_cursor() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);
    let events = history(30);

    // three full pages, then an empty page without `end`, all in one interval
    let driver = PaginationDriver::new(
        ScriptedFetcher::new(events.clone()),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(10).with_flush_interval(10),
    );
    let report = driver.run(None).await.unwrap();

    assert_eq!(report.requests, 4);
    assert_eq!(report.flushes, 1);
    assert_eq!(
        report.artifacts,
        vec![storage.messages_dir().join("start_t0__end_t30.ndjson")]
    );
    assert_eq!(event_ids_in(&report.artifacts), event_ids(&events));
    assert_eq!(report.checkpoint, Some(cursor(30)));
    assert_eq!(stored_checkpoint(&storage), Some(cursor(30)));

    // resuming a finished run asks once more and writes nothing new
    let again = PaginationDriver::new(
        ScriptedFetcher::new(events.clone()),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(10).with_flush_interval(10),
    );
    let report = again.resume().await.unwrap();

    assert_eq!(again.fetcher().calls(), vec![Some(cursor(30))]);
    assert_eq!(report.records, 0);
    assert!(report.artifacts.is_empty());
    assert_eq!(stored_checkpoint(&storage), Some(cursor(30)));
}

#[tokio::test]
async fn test_flush_interval_groups_pages() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);
    let progress = Arc::new(RecordingProgress::default());

    // 6 full pages of 10 and a short 7th page
    let driver = PaginationDriver::new(
        ScriptedFetcher::new(history(65)),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(10).with_flush_interval(3),
    )
    .with_progress(progress.clone());
    let report = driver.run(None).await.unwrap();

    assert_eq!(report.requests, 7);
    assert_eq!(report.flushes, 3);
    assert_eq!(
        *progress.checkpoints.lock().unwrap(),
        vec![cursor(30), cursor(60), cursor(65)]
    );
    assert_eq!(*progress.pages.lock().unwrap(), 7);
    assert_eq!(stored_checkpoint(&storage), Some(cursor(65)));
    assert_eq!(
        event_ids_in(&report.artifacts),
        event_ids(&history(65))
    );
}

#[tokio::test]
async fn test_zero_limit_and_interval_still_terminate() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);

    let driver = PaginationDriver::new(
        ScriptedFetcher::new(history(3)),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(0).with_flush_interval(0),
    );
    let report = driver.run(None).await.unwrap();

    // one record per page, then the empty terminal page
    assert_eq!(report.requests, 4);
    assert_eq!(report.records, 3);
    assert_eq!(report.artifacts.len(), 3);
    assert_eq!(event_ids_in(&report.artifacts), event_ids(&history(3)));
    assert_eq!(stored_checkpoint(&storage), Some(cursor(3)));
}

#[tokio::test]
async fn test_stop_boundary_keeps_straddling_page() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);

    // page 2 holds events 10..20; the boundary falls between events 14 and 15
    let boundary = NEWEST_TS - 145_000;
    let driver = PaginationDriver::new(
        ScriptedFetcher::new(history(100)),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM)
            .with_limit(10)
            .with_flush_interval(5)
            .with_stop_boundary(Some(boundary)),
    );
    let report = driver.run(None).await.unwrap();

    assert_eq!(report.requests, 2);
    assert_eq!(report.records, 20);
    assert_eq!(event_ids_in(&report.artifacts), event_ids(&history(20)));
    assert_eq!(stored_checkpoint(&storage), Some(cursor(20)));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_waits_without_using_retry_budget() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);
    let progress = Arc::new(RecordingProgress::default());

    // a ceiling of zero would abort on the first transient failure
    let driver = PaginationDriver::new(
        ScriptedFetcher::new(history(5)).with_script(vec![
            Some(FetchError::rate_limited_ms(500)),
            Some(FetchError::rate_limited_ms(500)),
        ]),
        persister(&storage),
        RetryPolicy::immediate(0),
        PaginationOptions::new(ROOM).with_limit(10),
    )
    .with_progress(progress.clone());

    let started = tokio::time::Instant::now();
    let report = driver.run(None).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(
        *progress.retries.lock().unwrap(),
        vec![Duration::from_millis(500), Duration::from_millis(500)]
    );
    assert_eq!(report.requests, 1);
    assert_eq!(report.records, 5);
    assert_eq!(driver.fetcher().calls().len(), 3);
}

#[tokio::test]
async fn test_transient_ceiling_fails_without_checkpointing_in_flight_page() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);

    let mut script = vec![None];
    script.extend((0..101).map(|_| Some(FetchError::transient("502 Bad Gateway"))));

    let driver = PaginationDriver::new(
        ScriptedFetcher::new(history(100)).with_script(script),
        persister(&storage),
        RetryPolicy::immediate(100),
        PaginationOptions::new(ROOM).with_limit(10).with_flush_interval(1),
    );
    let err = driver.run(None).await.unwrap_err();

    match &err {
        PaginationError::RetriesExhausted {
            requests,
            attempts,
            cursor: at,
            ..
        } => {
            assert_eq!(*requests, 1);
            assert_eq!(*attempts, 101);
            assert_eq!(at.as_deref(), Some(cursor(10).as_str()));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(driver.fetcher().calls().len(), 102);
    assert_eq!(stored_checkpoint(&storage), Some(cursor(10)));
}

#[tokio::test]
async fn test_interrupt_flushes_buffer_and_stops() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);
    let shutdown = ShutdownSignal::new();

    let driver = PaginationDriver::new(
        ScriptedFetcher::new(history(100)).with_shutdown_after(2, shutdown.clone()),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM).with_limit(10).with_flush_interval(10),
    )
    .with_shutdown(shutdown);
    let report = driver.run(None).await.unwrap();

    assert!(report.interrupted);
    assert_eq!(report.requests, 2);
    assert_eq!(driver.fetcher().calls().len(), 2);
    assert_eq!(report.flushes, 1);
    assert_eq!(event_ids_in(&report.artifacts), event_ids(&history(20)));
    assert_eq!(stored_checkpoint(&storage), Some(cursor(20)));
}

#[tokio::test]
async fn test_resume_without_checkpoint_fails() {
    let temp = TempDir::new().unwrap();
    let storage = RoomStorage::new(temp.path(), ROOM);

    let driver = PaginationDriver::new(
        ScriptedFetcher::new(history(10)),
        persister(&storage),
        RetryPolicy::immediate(3),
        PaginationOptions::new(ROOM),
    );
    let err = driver.resume().await.unwrap_err();

    assert!(matches!(err, PaginationError::NoCheckpoint { .. }));
    assert!(driver.fetcher().calls().is_empty());
    assert!(driver
        .persister()
        .checkpoints()
        .load()
        .await
        .unwrap()
        .is_none());
}

//! End-to-end pipeline behavior against fake collaborators.

mod common;

use std::sync::Arc;

use common::{
    FailingLog, MemoryPurgeLog, PurgeOutcome, RecordingBackend, pipeline, urls,
};
use folata::application::purge::PurgeLimits;
use folata::domain::entries::PurgeStatus;

#[tokio::test]
async fn invalidating_nothing_trivially_succeeds() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    assert!(pipeline.invalidate(&[]).await);
    assert!(backend.calls().is_empty());
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn blank_strings_are_filtered_before_any_work() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    assert!(pipeline.invalidate(&urls(&["", "   ", "\t"])).await);
    assert!(backend.calls().is_empty());
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn success_fans_out_one_entry_per_url() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    let result = pipeline
        .invalidate(&urls(&["https://example.com/a", "https://example.com/b?x=1"]))
        .await;

    assert!(result);
    assert_eq!(backend.calls(), vec![vec!["/a".to_string(), "/b?x=1".to_string()]]);

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].url, "/a");
    assert_eq!(entries[1].url, "/b?x=1");
    for entry in entries {
        assert_eq!(entry.status, PurgeStatus::Succeeded);
        assert!(entry.detail.is_none());
    }
}

#[tokio::test]
async fn backend_error_fails_every_url_in_the_batch() {
    let backend =
        RecordingBackend::with_script(vec![PurgeOutcome::Err("gateway timeout".to_string())]);
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    let result = pipeline.invalidate(&urls(&["/a", "/b"])).await;

    assert!(!result);
    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.status, PurgeStatus::Failed);
        let detail = entry.detail.as_ref().expect("failure detail");
        assert!(detail["error"].as_str().unwrap().contains("gateway timeout"));
    }
}

#[tokio::test]
async fn backend_false_is_broadcast_as_failed() {
    let backend = RecordingBackend::with_script(vec![PurgeOutcome::Ok(false)]);
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    assert!(!pipeline.invalidate(&urls(&["/a", "/b"])).await);

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == PurgeStatus::Failed));
}

#[tokio::test]
async fn duplicates_are_processed_independently() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    assert!(pipeline.invalidate(&urls(&["/same", "/same"])).await);

    assert_eq!(backend.calls(), vec![vec!["/same".to_string(), "/same".to_string()]]);
    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.status == PurgeStatus::Succeeded));
}

#[tokio::test]
async fn unparsable_urls_fail_closed_without_aborting_the_batch() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    let result = pipeline
        .invalidate(&urls(&["http://", "/fine", "/bad/*/position"]))
        .await;

    assert!(!result);
    // Only the good URL reaches the backend.
    assert_eq!(backend.calls(), vec![vec!["/fine".to_string()]]);

    let entries = log.entries();
    assert_eq!(entries.len(), 3);

    let failed: Vec<_> = entries
        .iter()
        .filter(|e| e.status == PurgeStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|e| e.detail.is_some()));

    let succeeded: Vec<_> = entries
        .iter()
        .filter(|e| e.status == PurgeStatus::Succeeded)
        .collect();
    assert_eq!(succeeded.len(), 1);
    assert_eq!(succeeded[0].url, "/fine");
}

#[tokio::test]
async fn wildcards_are_submitted_with_the_trailing_star() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let pipeline = pipeline(backend.clone(), log.clone(), PurgeLimits::default());

    assert!(pipeline.invalidate(&urls(&["https://example.com/news/*"])).await);
    assert_eq!(backend.calls(), vec![vec!["/news/*".to_string()]]);
}

#[tokio::test]
async fn oversized_batches_split_before_any_backend_call() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let limits = PurgeLimits {
        max_exact_paths: 2,
        max_wildcard_paths: 1,
    };
    let pipeline = pipeline(backend.clone(), log.clone(), limits);

    let result = pipeline
        .invalidate(&urls(&["/a", "/b", "/c", "/d", "/e"]))
        .await;

    assert!(result);
    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|call| call.len() <= 2));
    assert_eq!(log.entries().len(), 5);
}

#[tokio::test]
async fn a_failed_chunk_does_not_stop_later_chunks() {
    let backend = RecordingBackend::with_script(vec![
        PurgeOutcome::Err("first call refused".to_string()),
        PurgeOutcome::Ok(true),
    ]);
    let log = MemoryPurgeLog::new();
    let limits = PurgeLimits {
        max_exact_paths: 2,
        max_wildcard_paths: 1,
    };
    let pipeline = pipeline(backend.clone(), log.clone(), limits);

    let result = pipeline.invalidate(&urls(&["/a", "/b", "/c"])).await;

    assert!(!result);
    assert_eq!(backend.calls().len(), 2);

    let entries = log.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.status == PurgeStatus::Failed)
            .count(),
        2
    );
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.status == PurgeStatus::Succeeded)
            .count(),
        1
    );
}

#[tokio::test]
async fn log_write_failures_never_flip_the_result() {
    let backend = RecordingBackend::succeeding();
    let pipeline = pipeline(backend.clone(), Arc::new(FailingLog), PurgeLimits::default());

    assert!(pipeline.invalidate(&urls(&["/a"])).await);
    assert_eq!(backend.calls().len(), 1);
}

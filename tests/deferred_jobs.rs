//! Deferred invalidation: enqueue contract and worker processing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use apalis::prelude::Data;
use common::{MemoryPurgeLog, RecordingBackend, RecordingJobsRepo, pipeline, urls};
use folata::application::jobs::{
    INVALIDATE_URLS_JOB, InvalidateUrlsJobPayload, InvalidationWorkerContext,
    enqueue_invalidate_urls_job, process_invalidate_urls_job,
};
use folata::application::purge::PurgeLimits;
use folata::domain::entries::PurgeStatus;
use time::OffsetDateTime;

#[tokio::test]
async fn enqueue_schedules_after_the_configured_delay() {
    let jobs = RecordingJobsRepo::new();
    let before = OffsetDateTime::now_utc();

    let id = enqueue_invalidate_urls_job(
        jobs.as_ref(),
        urls(&["https://example.com/a", "https://example.com/b"]),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    assert_eq!(id.as_deref(), Some("job-1"));

    let recorded = jobs.jobs();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].job_type, INVALIDATE_URLS_JOB);
    assert!(recorded[0].run_at >= before + time::Duration::seconds(4));
    assert!(recorded[0].run_at <= OffsetDateTime::now_utc() + time::Duration::seconds(6));

    let payload: InvalidateUrlsJobPayload =
        serde_json::from_value(recorded[0].payload.clone()).unwrap();
    assert_eq!(payload.urls.len(), 2);
}

#[tokio::test]
async fn enqueueing_nothing_is_a_no_op() {
    let jobs = RecordingJobsRepo::new();
    let id = enqueue_invalidate_urls_job(jobs.as_ref(), Vec::new(), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(id.is_none());
    assert!(jobs.jobs().is_empty());
}

#[tokio::test]
async fn the_worker_runs_the_pipeline_when_the_job_fires() {
    let backend = RecordingBackend::succeeding();
    let log = MemoryPurgeLog::new();
    let context = InvalidationWorkerContext {
        pipeline: Arc::new(pipeline(
            backend.clone(),
            log.clone(),
            PurgeLimits::default(),
        )),
    };

    let payload = InvalidateUrlsJobPayload {
        urls: urls(&["https://example.com/a"]),
    };
    process_invalidate_urls_job(payload, Data::new(context))
        .await
        .unwrap();

    assert_eq!(backend.calls(), vec![vec!["/a".to_string()]]);
    let entries = log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, PurgeStatus::Succeeded);
}

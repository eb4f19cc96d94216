//! Deferred invalidation job.
//!
//! Content-change triggers must not block on CDN latency, so they enqueue a
//! job scheduled a few seconds out and return immediately; the worker runs
//! the pipeline when the job fires. Independently enqueued jobs run FIFO by
//! schedule time and there is no cancellation.

use std::time::Duration;

use apalis::prelude::{Data, Error as ApalisError};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};

use super::context::InvalidationWorkerContext;

pub const INVALIDATE_URLS_JOB: &str = "invalidate_urls";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidateUrlsJobPayload {
    pub urls: Vec<String>,
}

/// Enqueue a deferred invalidation for `urls`, to run after `delay`.
///
/// An empty list enqueues nothing and returns `None`. The job gets a single
/// attempt: the pipeline already records the outcome per URL, so a queue-level
/// retry would double-log.
pub async fn enqueue_invalidate_urls_job<J: JobsRepo + ?Sized>(
    repo: &J,
    urls: Vec<String>,
    delay: Duration,
) -> Result<Option<String>, RepoError> {
    if urls.is_empty() {
        return Ok(None);
    }

    let payload = serde_json::to_value(InvalidateUrlsJobPayload { urls })
        .map_err(RepoError::from_persistence)?;
    let record = NewJobRecord {
        job_type: INVALIDATE_URLS_JOB,
        payload,
        run_at: OffsetDateTime::now_utc() + delay,
        max_attempts: 1,
        priority: 0,
    };

    repo.enqueue_job(record).await.map(Some)
}

/// Process a deferred invalidation job.
///
/// The pipeline's boolean is already persisted per URL in the purge log, so
/// the job completes either way; only infrastructure-level defects would fail
/// it.
pub async fn process_invalidate_urls_job(
    payload: InvalidateUrlsJobPayload,
    context: Data<InvalidationWorkerContext>,
) -> Result<(), ApalisError> {
    let succeeded = context.pipeline.invalidate(&payload.urls).await;

    info!(
        target = "application::jobs::process_invalidate_urls_job",
        urls = payload.urls.len(),
        succeeded,
        "deferred invalidation completed"
    );

    Ok(())
}

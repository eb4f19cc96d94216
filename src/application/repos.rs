//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::application::pagination::{LogPage, PageRequest};
use crate::domain::entries::{PurgeLogEntry, PurgeStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Append-only store for purge attempts.
///
/// Appends must be safe under concurrent writers without application-level
/// coordination; ordering is recovered at read time (`created_at DESC`, ties
/// broken by insertion order).
#[async_trait]
pub trait PurgeLogRepo: Send + Sync {
    /// Insert one entry stamped with the current UTC time.
    async fn append(
        &self,
        url: &str,
        status: PurgeStatus,
        detail: Option<Value>,
    ) -> Result<(), RepoError>;

    /// List entries newest-first with offset pagination.
    async fn list(&self, page: PageRequest) -> Result<LogPage<PurgeLogEntry>, RepoError>;

    /// Delete entries older than `now - age`; returns the number removed.
    async fn prune_older_than(&self, age: Duration) -> Result<u64, RepoError>;

    /// Delete all entries unconditionally.
    async fn truncate(&self) -> Result<(), RepoError>;
}

/// New job parameters for the queue backend.
#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: &'static str,
    pub payload: Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

/// Enqueue access to the background job queue.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Enqueue a job, returning its assigned id.
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}

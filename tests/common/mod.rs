//! Shared fakes for integration tests: a scriptable purge backend, an
//! in-memory purge log, and a recording jobs repo.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folata::application::pagination::{LogPage, PageRequest};
use folata::application::pipeline::InvalidationPipeline;
use folata::application::purge::{PurgeBackend, PurgeError, PurgeLimits};
use folata::application::repos::{JobsRepo, NewJobRecord, PurgeLogRepo, RepoError};
use folata::cache::{CacheConfig, EdgeVersionStore};
use folata::domain::entries::{PurgeLogEntry, PurgeStatus, clamp_url_for_log};
use folata::domain::url::PurgePath;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

/// Scripted result for one backend call.
pub enum PurgeOutcome {
    Ok(bool),
    Err(String),
}

/// Purge backend that records every call and replays a script of outcomes.
/// Once the script is exhausted, further calls succeed.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Vec<String>>>,
    script: Mutex<Vec<PurgeOutcome>>,
}

impl RecordingBackend {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_script(script: Vec<PurgeOutcome>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PurgeBackend for RecordingBackend {
    async fn purge(&self, paths: &[PurgePath]) -> Result<bool, PurgeError> {
        self.calls.lock().unwrap().push(
            paths
                .iter()
                .map(|path| path.as_str().to_string())
                .collect(),
        );

        let outcome = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                PurgeOutcome::Ok(true)
            } else {
                script.remove(0)
            }
        };

        match outcome {
            PurgeOutcome::Ok(result) => Ok(result),
            PurgeOutcome::Err(message) => Err(PurgeError::backend(message)),
        }
    }
}

#[derive(Default)]
struct MemoryLogState {
    next_id: i64,
    entries: Vec<PurgeLogEntry>,
}

/// In-memory purge log honouring the repository contract: newest-first
/// listing with insertion order breaking timestamp ties, offset pagination,
/// age-based pruning, and URL clamping.
#[derive(Default)]
pub struct MemoryPurgeLog {
    state: Mutex<MemoryLogState>,
}

impl MemoryPurgeLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> Vec<PurgeLogEntry> {
        self.state.lock().unwrap().entries.clone()
    }

    /// Append with an explicit timestamp, for pagination/retention tests.
    pub fn append_at(&self, url: &str, status: PurgeStatus, created_at: OffsetDateTime) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.push(PurgeLogEntry {
            id,
            created_at,
            url: clamp_url_for_log(url),
            status,
            detail: None,
        });
    }
}

#[async_trait]
impl PurgeLogRepo for MemoryPurgeLog {
    async fn append(
        &self,
        url: &str,
        status: PurgeStatus,
        detail: Option<Value>,
    ) -> Result<(), RepoError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.push(PurgeLogEntry {
            id,
            created_at: OffsetDateTime::now_utc(),
            url: clamp_url_for_log(url),
            status,
            detail,
        });
        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<LogPage<PurgeLogEntry>, RepoError> {
        let state = self.state.lock().unwrap();
        let mut ordered: Vec<PurgeLogEntry> = state.entries.clone();
        ordered.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = ordered.len() as u64;
        let entries = ordered
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page() as usize)
            .collect();

        Ok(LogPage::new(entries, total, page.per_page()))
    }

    async fn prune_older_than(&self, age: Duration) -> Result<u64, RepoError> {
        let cutoff = OffsetDateTime::now_utc() - age;
        let mut state = self.state.lock().unwrap();
        let before = state.entries.len();
        state.entries.retain(|entry| entry.created_at >= cutoff);
        Ok((before - state.entries.len()) as u64)
    }

    async fn truncate(&self) -> Result<(), RepoError> {
        self.state.lock().unwrap().entries.clear();
        Ok(())
    }
}

/// Log whose appends always fail, for log-durability tests.
#[derive(Default)]
pub struct FailingLog;

#[async_trait]
impl PurgeLogRepo for FailingLog {
    async fn append(
        &self,
        _url: &str,
        _status: PurgeStatus,
        _detail: Option<Value>,
    ) -> Result<(), RepoError> {
        Err(RepoError::from_persistence("append rejected by test"))
    }

    async fn list(&self, page: PageRequest) -> Result<LogPage<PurgeLogEntry>, RepoError> {
        Ok(LogPage::new(Vec::new(), 0, page.per_page()))
    }

    async fn prune_older_than(&self, _age: Duration) -> Result<u64, RepoError> {
        Ok(0)
    }

    async fn truncate(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Jobs repo that records enqueued jobs and hands out sequential ids.
#[derive(Default)]
pub struct RecordingJobsRepo {
    jobs: Mutex<Vec<NewJobRecord>>,
}

impl RecordingJobsRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<NewJobRecord> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobsRepo for RecordingJobsRepo {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push(job);
        Ok(format!("job-{}", jobs.len()))
    }
}

/// Pipeline wired to fakes, with the version store left at defaults.
pub fn pipeline(
    backend: Arc<dyn PurgeBackend>,
    log: Arc<dyn PurgeLogRepo>,
    limits: PurgeLimits,
) -> InvalidationPipeline {
    let versions = Arc::new(EdgeVersionStore::new(&CacheConfig::default()));
    InvalidationPipeline::new(backend, log, versions, limits)
}

pub fn urls(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|url| url.to_string()).collect()
}

//! Invalidation pipeline: normalize → version bump → purge → log fan-out.
//!
//! One pipeline call covers one batch of raw URLs. The purge backend returns
//! a single aggregate result per call, but auditability requires one log row
//! per URL, so the batch result is fanned out across the batch when logging.

use std::ops::Range;
use std::sync::Arc;

use metrics::counter;
use serde_json::json;
use tracing::{debug, warn};

use crate::application::purge::{PurgeBackend, PurgeLimits};
use crate::application::repos::PurgeLogRepo;
use crate::cache::EdgeVersionStore;
use crate::domain::entries::PurgeStatus;
use crate::domain::url::PurgePath;

pub struct InvalidationPipeline {
    backend: Arc<dyn PurgeBackend>,
    log: Arc<dyn PurgeLogRepo>,
    versions: Arc<EdgeVersionStore>,
    limits: PurgeLimits,
}

impl InvalidationPipeline {
    pub fn new(
        backend: Arc<dyn PurgeBackend>,
        log: Arc<dyn PurgeLogRepo>,
        versions: Arc<EdgeVersionStore>,
        limits: PurgeLimits,
    ) -> Self {
        Self {
            backend,
            log,
            versions,
            limits,
        }
    }

    /// Invalidate a batch of raw URLs.
    ///
    /// Empty and whitespace-only strings are dropped before any other work
    /// and never reach the log. Invalidating nothing trivially succeeds with
    /// zero log writes and zero backend calls.
    ///
    /// Returns `true` only when every URL normalized and every backend call
    /// reported success. Duplicates are legal and processed independently.
    pub async fn invalidate(&self, urls: &[String]) -> bool {
        let targets: Vec<&str> = urls
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .collect();

        if targets.is_empty() {
            return true;
        }

        // Local edge caches key on the full URL, so bump before normalization
        // strips the host. Best-effort: failures stay invisible to the caller.
        for url in &targets {
            self.versions.bump_url(url);
        }

        let mut all_succeeded = true;
        let mut batch = Vec::with_capacity(targets.len());
        for raw in &targets {
            match PurgePath::parse(raw) {
                Ok(path) => batch.push(path),
                Err(err) => {
                    all_succeeded = false;
                    counter!("folata_purge_urls_failed_total").increment(1);
                    self.append(raw, PurgeStatus::Failed, Some(json!({ "error": err.to_string() })))
                        .await;
                }
            }
        }

        // The backend caps exact and wildcard paths per call, so an oversized
        // batch is split into multiple sequential calls, each logged on its
        // own. A failed call does not stop the calls after it.
        for range in chunk_ranges(&batch, self.limits) {
            let chunk = &batch[range];
            counter!("folata_purge_calls_total").increment(1);

            match self.backend.purge(chunk).await {
                Ok(succeeded) => {
                    debug!(
                        target = "application::pipeline",
                        urls = chunk.len(),
                        succeeded,
                        "purge call completed"
                    );
                    let status = if succeeded {
                        counter!("folata_purge_urls_succeeded_total").increment(chunk.len() as u64);
                        PurgeStatus::Succeeded
                    } else {
                        counter!("folata_purge_urls_failed_total").increment(chunk.len() as u64);
                        PurgeStatus::Failed
                    };
                    for path in chunk {
                        self.append(path.as_str(), status, None).await;
                    }
                    all_succeeded &= succeeded;
                }
                Err(err) => {
                    warn!(
                        target = "application::pipeline",
                        urls = chunk.len(),
                        error = %err,
                        "purge call failed"
                    );
                    counter!("folata_purge_call_failure_total").increment(1);
                    counter!("folata_purge_urls_failed_total").increment(chunk.len() as u64);
                    let detail = json!({ "error": err.to_string() });
                    for path in chunk {
                        self.append(path.as_str(), PurgeStatus::Failed, Some(detail.clone()))
                            .await;
                    }
                    all_succeeded = false;
                }
            }
        }

        all_succeeded
    }

    /// Log durability is best-effort: a failed append must never flip the
    /// pipeline result, so errors stop here.
    async fn append(&self, url: &str, status: PurgeStatus, detail: Option<serde_json::Value>) {
        if let Err(err) = self.log.append(url, status, detail).await {
            counter!("folata_log_append_failure_total").increment(1);
            warn!(
                target = "application::pipeline",
                url,
                error = %err,
                "failed to append purge log entry"
            );
        }
    }
}

/// Split a normalized batch into contiguous in-order chunks such that no
/// chunk exceeds either per-call ceiling.
fn chunk_ranges(paths: &[PurgePath], limits: PurgeLimits) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut exact = 0usize;
    let mut wildcards = 0usize;

    for (index, path) in paths.iter().enumerate() {
        let (count, limit) = if path.is_wildcard() {
            (&mut wildcards, limits.max_wildcard_paths)
        } else {
            (&mut exact, limits.max_exact_paths)
        };

        if *count == limit {
            ranges.push(start..index);
            start = index;
            exact = 0;
            wildcards = 0;
        }

        if path.is_wildcard() {
            wildcards += 1;
        } else {
            exact += 1;
        }
    }

    if start < paths.len() {
        ranges.push(start..paths.len());
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> PurgePath {
        PurgePath::parse(raw).unwrap()
    }

    fn limits(max_exact: usize, max_wildcard: usize) -> PurgeLimits {
        PurgeLimits {
            max_exact_paths: max_exact,
            max_wildcard_paths: max_wildcard,
        }
    }

    #[test]
    fn small_batch_is_one_chunk() {
        let batch = vec![path("/a"), path("/b"), path("/c/*")];
        assert_eq!(chunk_ranges(&batch, limits(3, 1)), vec![0..3]);
    }

    #[test]
    fn empty_batch_yields_no_chunks() {
        assert!(chunk_ranges(&[], limits(3, 1)).is_empty());
    }

    #[test]
    fn exact_ceiling_splits_in_order() {
        let batch = vec![path("/a"), path("/b"), path("/c"), path("/d"), path("/e")];
        assert_eq!(chunk_ranges(&batch, limits(2, 1)), vec![0..2, 2..4, 4..5]);
    }

    #[test]
    fn wildcard_ceiling_splits_independently_of_exact() {
        let batch = vec![path("/a/*"), path("/b"), path("/c/*"), path("/d/*")];
        // Second wildcard forces a split even though exact capacity remains.
        assert_eq!(chunk_ranges(&batch, limits(10, 1)), vec![0..2, 2..3, 3..4]);
    }

    #[test]
    fn every_chunk_respects_both_ceilings() {
        let batch: Vec<PurgePath> = (0..23)
            .map(|index| {
                if index % 3 == 0 {
                    path(&format!("/wild/{index}/*"))
                } else {
                    path(&format!("/exact/{index}"))
                }
            })
            .collect();
        let limits = limits(4, 2);

        let ranges = chunk_ranges(&batch, limits);
        assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), batch.len());
        for range in ranges {
            assert!(limits.check(&batch[range]).is_ok());
        }
    }
}

//! In-process version counters for edge-cached pages.

use std::sync::RwLock;

use lru::LruCache;
use metrics::counter;

use super::config::CacheConfig;
use super::keys::version_key;
use super::lock::rw_write;

const SOURCE: &str = "cache::versions";

/// Version-counter store keyed by hashed cache-key URL.
///
/// Bumping a key tells the embedding edge-cache layer to treat every cached
/// variant of that URL as a miss. Counters are advisory: eviction under the
/// LRU limit loses nothing durable, since an unknown key reads as version 0.
pub struct EdgeVersionStore {
    enabled: bool,
    versions: RwLock<LruCache<String, u64>>,
}

impl EdgeVersionStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enable_version_store,
            versions: RwLock::new(LruCache::new(config.version_key_limit_non_zero())),
        }
    }

    /// Bump the version for a raw URL, returning the new version.
    ///
    /// No-op (`None`) when the store is disabled or the URL is empty.
    pub fn bump_url(&self, url: &str) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        let key = version_key(url)?;

        counter!("folata_edge_version_bump_total").increment(1);
        let mut versions = rw_write(&self.versions, SOURCE, "bump_url");
        let next = versions.get(&key).copied().unwrap_or(0) + 1;
        versions.put(key, next);
        Some(next)
    }

    /// Current version for a raw URL, if tracked.
    // LruCache::get refreshes recency, so reads also take the write guard.
    pub fn current(&self, url: &str) -> Option<u64> {
        if !self.enabled {
            return None;
        }
        let key = version_key(url)?;
        rw_write(&self.versions, SOURCE, "current")
            .get(&key)
            .copied()
    }
}

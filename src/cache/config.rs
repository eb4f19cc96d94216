//! Cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_VERSION_KEY_LIMIT: usize = 4096;
// 14 days, matching the long-cache policy the purge pipeline exists to serve.
const DEFAULT_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 14;

/// Cache configuration from `folata.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the in-process version-counter store.
    pub enable_version_store: bool,
    /// Maximum tracked version keys before LRU eviction.
    pub version_key_limit: usize,
    /// `s-maxage` stamped on cacheable responses, in seconds.
    pub max_age_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_version_store: true,
            version_key_limit: DEFAULT_VERSION_KEY_LIMIT,
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enable_version_store: settings.enable_version_store,
            version_key_limit: settings.version_key_limit,
            max_age_seconds: settings.max_age_seconds,
        }
    }
}

impl CacheConfig {
    /// Returns the version key limit as NonZeroUsize, clamping to 1 if zero.
    pub fn version_key_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.version_key_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_the_store_with_a_two_week_max_age() {
        let config = CacheConfig::default();
        assert!(config.enable_version_store);
        assert_eq!(config.max_age_seconds, 1_209_600);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let config = CacheConfig {
            version_key_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.version_key_limit_non_zero().get(), 1);
    }
}

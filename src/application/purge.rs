//! Purge backend seam.
//!
//! The external CDN purge API is reached only through [`PurgeBackend`]. The
//! trait accepts [`PurgePath`] values, so normalization is guaranteed by the
//! type; implementations translate every transport or API failure into a
//! [`PurgeError`] — raw client errors never cross this boundary.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::url::{PathKind, PurgePath};

pub const DEFAULT_MAX_EXACT_PATHS: usize = 3000;
pub const DEFAULT_MAX_WILDCARD_PATHS: usize = 15;

/// Per-call ceilings imposed by the purge backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeLimits {
    pub max_exact_paths: usize,
    pub max_wildcard_paths: usize,
}

impl Default for PurgeLimits {
    fn default() -> Self {
        Self {
            max_exact_paths: DEFAULT_MAX_EXACT_PATHS,
            max_wildcard_paths: DEFAULT_MAX_WILDCARD_PATHS,
        }
    }
}

impl PurgeLimits {
    /// Check a batch against both ceilings before any network activity.
    pub fn check(&self, paths: &[PurgePath]) -> Result<(), PurgeError> {
        let wildcards = paths.iter().filter(|path| path.is_wildcard()).count();
        let exact = paths.len() - wildcards;

        if exact > self.max_exact_paths {
            return Err(PurgeError::TooManyPaths {
                kind: PathKind::Exact,
                count: exact,
                limit: self.max_exact_paths,
            });
        }
        if wildcards > self.max_wildcard_paths {
            return Err(PurgeError::TooManyPaths {
                kind: PathKind::Wildcard,
                count: wildcards,
                limit: self.max_wildcard_paths,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PurgeError {
    #[error("purge backend call failed: {message}")]
    Backend { message: String },
    #[error("batch of {count} {kind:?} paths exceeds the per-call limit of {limit}")]
    TooManyPaths {
        kind: PathKind,
        count: usize,
        limit: usize,
    },
}

impl PurgeError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// One synchronous purge call covering a whole batch.
///
/// The backend reports a single aggregate boolean per call; callers that need
/// per-URL bookkeeping fan the result out themselves. An empty batch is a
/// successful no-op and must not touch the network.
#[async_trait]
pub trait PurgeBackend: Send + Sync {
    async fn purge(&self, paths: &[PurgePath]) -> Result<bool, PurgeError>;
}

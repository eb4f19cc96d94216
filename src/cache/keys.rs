//! Edge-cache version keys.
//!
//! Edge caches key pages on the full URL without its query string, with the
//! scheme collapsed to `http` so the secure and plain variants of a page
//! share one counter. The key is hashed so callers hold an opaque token
//! rather than the URL itself.

use sha2::{Digest, Sha256};

/// Compute the version key for a raw URL.
///
/// Returns `None` for empty input — an empty URL has nothing to bump.
pub fn version_key(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let without_query = match url.split_once('?') {
        Some((before, _)) => before,
        None => url,
    };

    let normalized = if let Some(rest) = without_query.strip_prefix("https://") {
        format!("http://{rest}")
    } else if without_query.starts_with("http://") {
        without_query.to_string()
    } else {
        format!("http://{without_query}")
    };

    Some(hex::encode(Sha256::digest(normalized.as_bytes())))
}

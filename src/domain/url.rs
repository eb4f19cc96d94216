//! Purge target normalization.
//!
//! The purge backend and the purge log both operate on site-relative targets:
//! path plus optional query, no scheme, host, or fragment. `PurgePath` is the
//! validated form — it can only be constructed through [`PurgePath::parse`],
//! so downstream code never sees an unnormalized or malformed target.

use std::fmt;

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlNormalizeError {
    #[error("url is empty")]
    Empty,
    #[error("url could not be parsed: {reason}")]
    Parse { reason: String },
    #[error("wildcard `*` is only allowed as the final character")]
    MalformedWildcard,
}

impl UrlNormalizeError {
    fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }
}

/// Whether a purge target addresses one path or a whole prefix.
///
/// The backend imposes a separate (smaller) per-call ceiling on wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Exact,
    Wildcard,
}

/// A normalized purge target: `/path` or `/path?query`, wildcard only as the
/// trailing character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgePath {
    value: String,
    kind: PathKind,
}

impl PurgePath {
    /// Normalize a raw URL into a purge target.
    ///
    /// Accepts absolute URLs, `/`-rooted paths, and bare `host/path` strings
    /// (an `http://` prefix is assumed for the latter). The scheme, host, and
    /// fragment are discarded; a missing path becomes `/`.
    pub fn parse(raw: &str) -> Result<Self, UrlNormalizeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(UrlNormalizeError::Empty);
        }

        let (path, query) = if raw.starts_with('/') {
            split_relative(raw)
        } else {
            split_absolute(raw)?
        };

        let mut value = if path.is_empty() {
            String::from("/")
        } else {
            path
        };
        if let Some(query) = query
            && !query.is_empty()
        {
            value.push('?');
            value.push_str(&query);
        }

        let kind = classify(&value)?;
        Ok(Self { value, kind })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> PathKind {
        self.kind
    }

    pub fn is_wildcard(&self) -> bool {
        self.kind == PathKind::Wildcard
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for PurgePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

fn split_relative(raw: &str) -> (String, Option<String>) {
    let without_fragment = match raw.split_once('#') {
        Some((before, _)) => before,
        None => raw,
    };
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (without_fragment.to_string(), None),
    }
}

fn split_absolute(raw: &str) -> Result<(String, Option<String>), UrlNormalizeError> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let parsed =
        Url::parse(&candidate).map_err(|err| UrlNormalizeError::parse(err.to_string()))?;
    if !parsed.has_host() {
        return Err(UrlNormalizeError::parse("url has no host"));
    }

    Ok((
        parsed.path().to_string(),
        parsed.query().map(str::to_string),
    ))
}

fn classify(value: &str) -> Result<PathKind, UrlNormalizeError> {
    match value.match_indices('*').count() {
        0 => Ok(PathKind::Exact),
        1 if value.ends_with('*') => Ok(PathKind::Wildcard),
        _ => Err(UrlNormalizeError::MalformedWildcard),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_url_keeps_path_and_query() {
        let path = PurgePath::parse("https://example.com/foo?bar=1").unwrap();
        assert_eq!(path.as_str(), "/foo?bar=1");
        assert_eq!(path.kind(), PathKind::Exact);
    }

    #[test]
    fn fragment_is_discarded() {
        let path = PurgePath::parse("https://example.com/foo?bar=1#section").unwrap();
        assert_eq!(path.as_str(), "/foo?bar=1");

        let relative = PurgePath::parse("/foo#section").unwrap();
        assert_eq!(relative.as_str(), "/foo");
    }

    #[test]
    fn bare_host_defaults_to_root() {
        let path = PurgePath::parse("example.com").unwrap();
        assert_eq!(path.as_str(), "/");
    }

    #[test]
    fn schemeless_host_and_path_is_accepted() {
        let path = PurgePath::parse("example.com/news?page=2").unwrap();
        assert_eq!(path.as_str(), "/news?page=2");
    }

    #[test]
    fn relative_path_passes_through() {
        let path = PurgePath::parse("/news/2026/").unwrap();
        assert_eq!(path.as_str(), "/news/2026/");
    }

    #[test]
    fn empty_query_is_dropped() {
        let path = PurgePath::parse("/foo?").unwrap();
        assert_eq!(path.as_str(), "/foo");
    }

    #[test]
    fn empty_input_is_refused() {
        assert_eq!(PurgePath::parse(""), Err(UrlNormalizeError::Empty));
        assert_eq!(PurgePath::parse("   "), Err(UrlNormalizeError::Empty));
    }

    #[test]
    fn unparsable_input_fails_closed() {
        assert!(matches!(
            PurgePath::parse("http://"),
            Err(UrlNormalizeError::Parse { .. })
        ));
    }

    #[test]
    fn trailing_wildcard_is_accepted() {
        let path = PurgePath::parse("/foo/*").unwrap();
        assert_eq!(path.kind(), PathKind::Wildcard);
        assert_eq!(path.as_str(), "/foo/*");
    }

    #[test]
    fn mid_path_wildcard_is_rejected() {
        assert_eq!(
            PurgePath::parse("/foo/*/bar"),
            Err(UrlNormalizeError::MalformedWildcard)
        );
    }

    #[test]
    fn double_wildcard_is_rejected() {
        assert_eq!(
            PurgePath::parse("/foo/**"),
            Err(UrlNormalizeError::MalformedWildcard)
        );
    }
}

//! Purge log records.

use serde::Serialize;
use time::OffsetDateTime;

/// Widest URL the log schema stores; longer targets are clamped at insert.
/// Purge submission itself is never truncated.
pub const LOG_URL_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeStatus {
    Succeeded,
    Failed,
}

impl PurgeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PurgeStatus::Succeeded => "succeeded",
            PurgeStatus::Failed => "failed",
        }
    }
}

impl TryFrom<&str> for PurgeStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "succeeded" => Ok(PurgeStatus::Succeeded),
            "failed" => Ok(PurgeStatus::Failed),
            other => Err(format!("unknown purge status `{other}`")),
        }
    }
}

/// One immutable row of the purge log.
///
/// Entries are only ever appended; retention pruning and explicit truncation
/// are the only deletion paths.
#[derive(Debug, Clone, Serialize)]
pub struct PurgeLogEntry {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub url: String,
    pub status: PurgeStatus,
    pub detail: Option<serde_json::Value>,
}

/// Clamp a normalized URL to the log column width, on a char boundary.
pub fn clamp_url_for_log(url: &str) -> String {
    url.chars().take(LOG_URL_MAX_CHARS).collect()
}

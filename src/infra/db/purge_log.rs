use async_trait::async_trait;
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::{
    application::pagination::{LogPage, PageRequest},
    application::repos::{PurgeLogRepo, RepoError},
    domain::entries::{PurgeLogEntry, PurgeStatus, clamp_url_for_log},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PurgeLogRow {
    id: i64,
    created_at: OffsetDateTime,
    url: String,
    status: String,
    detail: Option<Value>,
}

impl TryFrom<PurgeLogRow> for PurgeLogEntry {
    type Error = RepoError;

    fn try_from(row: PurgeLogRow) -> Result<Self, Self::Error> {
        let status = PurgeStatus::try_from(row.status.as_str())
            .map_err(RepoError::from_persistence)?;

        Ok(Self {
            id: row.id,
            created_at: row.created_at,
            url: row.url,
            status,
            detail: row.detail,
        })
    }
}

#[async_trait]
impl PurgeLogRepo for PostgresRepositories {
    async fn append(
        &self,
        url: &str,
        status: PurgeStatus,
        detail: Option<Value>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO purge_log (created_at, url, status, detail) VALUES ($1, $2, $3, $4)",
        )
        .bind(OffsetDateTime::now_utc())
        .bind(clamp_url_for_log(url))
        .bind(status.as_str())
        .bind(detail)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list(&self, page: PageRequest) -> Result<LogPage<PurgeLogEntry>, RepoError> {
        let rows: Vec<PurgeLogRow> = sqlx::query_as(
            "SELECT id, created_at, url, status, detail FROM purge_log \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(page.per_page()))
        .bind(page.offset() as i64)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purge_log")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let entries = rows
            .into_iter()
            .map(PurgeLogEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LogPage::new(entries, total.max(0) as u64, page.per_page()))
    }

    async fn prune_older_than(&self, age: Duration) -> Result<u64, RepoError> {
        let cutoff = OffsetDateTime::now_utc() - age;
        let result = sqlx::query("DELETE FROM purge_log WHERE created_at < $1")
            .bind(cutoff)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn truncate(&self) -> Result<(), RepoError> {
        sqlx::query("TRUNCATE purge_log RESTART IDENTITY")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}

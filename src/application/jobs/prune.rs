//! Cron job for pruning purge log entries past the retention age.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::*;
use apalis_cron::Schedule;
use metrics::counter;

use crate::application::repos::PurgeLogRepo;

/// Marker struct for the cron-triggered retention job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron
/// compatibility.
#[derive(Default, Debug, Clone)]
pub struct PruneLogJob;

impl From<chrono::DateTime<chrono::Utc>> for PruneLogJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Context for the retention job worker.
#[derive(Clone)]
pub struct PruneLogContext {
    pub log: Arc<dyn PurgeLogRepo>,
    pub retention_age: time::Duration,
}

/// Process the retention job: bulk-delete entries older than the cutoff.
/// Pruning is independent of in-flight invalidations.
pub async fn process_prune_log_job(
    _job: PruneLogJob,
    ctx: Data<PruneLogContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.log.prune_older_than(ctx.retention_age).await {
        Ok(deleted) if deleted > 0 => {
            counter!("folata_log_prune_deleted_total").increment(deleted);
            tracing::info!(deleted, "Pruned purge log entries");
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to prune purge log");
        }
        _ => {}
    }
    Ok(())
}

/// Create the cron schedule for log retention.
/// Runs daily at 02:00 local time: "0 0 2 * * *"
pub fn prune_log_schedule() -> Schedule {
    Schedule::from_str("0 0 2 * * *").expect("Invalid cron expression for prune_log")
}

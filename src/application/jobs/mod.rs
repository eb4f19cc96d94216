mod context;
mod invalidate;
mod prune;

pub use context::InvalidationWorkerContext;
pub use invalidate::{
    INVALIDATE_URLS_JOB, InvalidateUrlsJobPayload, enqueue_invalidate_urls_job,
    process_invalidate_urls_job,
};
pub use prune::{PruneLogContext, PruneLogJob, process_prune_log_job, prune_log_schedule};

use std::sync::Arc;

use crate::application::pipeline::InvalidationPipeline;

/// Shared context passed to invalidation job workers.
#[derive(Clone)]
pub struct InvalidationWorkerContext {
    pub pipeline: Arc<InvalidationPipeline>,
}

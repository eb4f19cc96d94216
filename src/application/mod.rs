pub mod error;
pub mod jobs;
pub mod pagination;
pub mod pipeline;
pub mod purge;
pub mod repos;
pub mod resolver;

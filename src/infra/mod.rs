pub mod db;
pub mod error;
pub mod http;
pub mod purge;
pub mod telemetry;

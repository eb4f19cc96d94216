//! folata: CDN purge companion for self-hosted publishing systems.
//!
//! The crate decides *what* to invalidate when content changes, submits the
//! purge to an external CDN API, and records *whether* each attempt succeeded
//! in an auditable log. It does not store cached content itself.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

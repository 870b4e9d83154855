//! Core domain types for the job runner.
//!
//! This crate contains shared types used across all packages:
//! - JobId, JobRecord and JobState for launched commands
//! - StoreDocument for the per-group state file
//! - RunnerConfig for group configuration

mod config;
mod document;
mod job;

pub use config::{ConfigError, DEFAULT_GROUP, RunnerConfig};
pub use document::StoreDocument;
pub use job::{JobId, JobRecord, JobState, JobStatus, StatusReport};

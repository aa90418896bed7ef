//! Jobkeep Store
//!
//! This crate provides the durable registry behind jobkeep. It tracks named
//! jobs with an opaque info payload, and a separate opaque progress marker per
//! job. Data is persisted to a SQLite database.
//!
//! The [`JobStore`] trait defines operations for:
//! - Registering jobs and updating their info
//! - Recording and reading job progress
//! - Listing registered jobs
//!
//! Progress can only be written for a registered job. Every operation runs as
//! a single SQL statement, so concurrent callers sharing one store observe
//! per-name atomic behavior.

mod config;
mod error;
mod sqlite;
mod types;

use std::collections::HashMap;

pub use config::StoreConfig;
pub use error::StoreError;
pub use sqlite::SqliteJobStore;
pub use types::{JobRecord, ProgressRecord};

use async_trait::async_trait;

/// Storage trait for jobs and their progress.
#[async_trait]
pub trait JobStore: Send + Sync {
  /// Register a new job. Fails with [`StoreError::JobExists`] if the name is taken.
  async fn create_job(&self, name: &str, info: &str) -> Result<(), StoreError>;

  /// Replace the info of an existing job.
  async fn update_job(&self, name: &str, info: &str) -> Result<(), StoreError>;

  /// Check whether a job is registered.
  async fn job_exists(&self, name: &str) -> Result<bool, StoreError>;

  /// Snapshot of every registered job, keyed by name.
  async fn list_jobs(&self) -> Result<HashMap<String, String>, StoreError>;

  /// Insert or overwrite the progress of an existing job.
  async fn set_progress(&self, name: &str, progress: &str) -> Result<(), StoreError>;

  /// Check whether a progress record exists for the name.
  async fn progress_exists(&self, name: &str) -> Result<bool, StoreError>;

  /// Get the stored progress. Fails with [`StoreError::ProgressNotFound`] if none was set.
  async fn get_progress(&self, name: &str) -> Result<String, StoreError>;
}

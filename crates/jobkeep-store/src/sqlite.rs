use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, instrument};

use crate::error::storage;
use crate::{JobRecord, JobStore, ProgressRecord, StoreConfig, StoreError};

/// SQLite-based store implementation.
///
/// Cloning is cheap and every clone shares the same connection pool.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
  pool: SqlitePool,
}

impl SqliteJobStore {
  /// Create a new SQLite store with the given connection pool.
  ///
  /// The schema is not touched; call [`migrate`](Self::migrate) before use.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open the database at `path` with default settings, creating the file
  /// and tables if they are missing.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    Self::connect(&StoreConfig::new(path.as_ref())).await
  }

  /// Open the database described by `config` and run migrations.
  #[instrument(name = "store_connect", skip_all, fields(path = %config.path.display()))]
  pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
    config.validate()?;

    let journal_mode = if config.wal {
      SqliteJournalMode::Wal
    } else {
      SqliteJournalMode::Delete
    };

    let options = SqliteConnectOptions::new()
      .filename(&config.path)
      .create_if_missing(config.create_if_missing)
      .busy_timeout(config.busy_timeout())
      .journal_mode(journal_mode);

    let pool = SqlitePoolOptions::new()
      .max_connections(config.max_connections)
      .connect_with(options)
      .await
      .map_err(storage("open"))?;

    let store = Self::new(pool);
    store.migrate().await?;

    debug!("store opened");
    Ok(store)
  }

  /// Create the `jobs` and `progresses` tables if they do not exist.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  /// Close every pooled connection. Later operations fail with a storage error.
  pub async fn close(&self) {
    self.pool.close().await;
  }
}

#[async_trait]
impl JobStore for SqliteJobStore {
  #[instrument(level = "debug", skip_all, fields(job_name = %name))]
  async fn create_job(&self, name: &str, info: &str) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            INSERT INTO jobs (job_name, job_info)
            VALUES (?, ?)
            ON CONFLICT(job_name) DO NOTHING
            "#,
    )
    .bind(name)
    .bind(info)
    .execute(&self.pool)
    .await
    .map_err(storage("create_job"))?;

    if result.rows_affected() == 0 {
      debug!("job already exists");
      return Err(StoreError::JobExists {
        name: name.to_string(),
      });
    }

    debug!("job_created");
    Ok(())
  }

  #[instrument(level = "debug", skip_all, fields(job_name = %name))]
  async fn update_job(&self, name: &str, info: &str) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            UPDATE jobs
            SET job_info = ?
            WHERE job_name = ?
            "#,
    )
    .bind(info)
    .bind(name)
    .execute(&self.pool)
    .await
    .map_err(storage("update_job"))?;

    if result.rows_affected() == 0 {
      return Err(StoreError::JobNotFound {
        name: name.to_string(),
      });
    }

    debug!("job_updated");
    Ok(())
  }

  #[instrument(level = "debug", skip_all, fields(job_name = %name))]
  async fn job_exists(&self, name: &str) -> Result<bool, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE job_name = ?")
      .bind(name)
      .fetch_one(&self.pool)
      .await
      .map_err(storage("job_exists"))?;

    Ok(count > 0)
  }

  #[instrument(level = "debug", skip_all)]
  async fn list_jobs(&self) -> Result<HashMap<String, String>, StoreError> {
    let records: Vec<JobRecord> = sqlx::query_as("SELECT job_name, job_info FROM jobs")
      .fetch_all(&self.pool)
      .await
      .map_err(storage("list_jobs"))?;

    debug!(count = records.len(), "jobs listed");
    Ok(
      records
        .into_iter()
        .map(|record| (record.job_name, record.job_info))
        .collect(),
    )
  }

  #[instrument(level = "debug", skip_all, fields(job_name = %name))]
  async fn set_progress(&self, name: &str, progress: &str) -> Result<(), StoreError> {
    // The job check and the upsert share one statement, so a progress row is
    // never written for a name missing from `jobs`.
    let result = sqlx::query(
      r#"
            INSERT INTO progresses (job_name, progress)
            SELECT ?, ?
            WHERE EXISTS (SELECT 1 FROM jobs WHERE job_name = ?)
            ON CONFLICT(job_name) DO UPDATE SET progress = excluded.progress
            "#,
    )
    .bind(name)
    .bind(progress)
    .bind(name)
    .execute(&self.pool)
    .await
    .map_err(storage("set_progress"))?;

    if result.rows_affected() == 0 {
      return Err(StoreError::JobNotFound {
        name: name.to_string(),
      });
    }

    debug!("progress_set");
    Ok(())
  }

  #[instrument(level = "debug", skip_all, fields(job_name = %name))]
  async fn progress_exists(&self, name: &str) -> Result<bool, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM progresses WHERE job_name = ?")
      .bind(name)
      .fetch_one(&self.pool)
      .await
      .map_err(storage("progress_exists"))?;

    Ok(count > 0)
  }

  #[instrument(level = "debug", skip_all, fields(job_name = %name))]
  async fn get_progress(&self, name: &str) -> Result<String, StoreError> {
    let record: Option<ProgressRecord> =
      sqlx::query_as("SELECT job_name, progress FROM progresses WHERE job_name = ?")
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("get_progress"))?;

    record
      .map(|record| record.progress)
      .ok_or_else(|| StoreError::ProgressNotFound {
        name: name.to_string(),
      })
  }
}

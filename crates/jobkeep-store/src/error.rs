//! Store error types.

/// Errors returned by [`JobStore`](crate::JobStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// A job with this name is already registered.
  #[error("job '{name}' already exists")]
  JobExists { name: String },

  /// No job with this name is registered.
  #[error("job '{name}' not found")]
  JobNotFound { name: String },

  /// No progress has been recorded for this name.
  #[error("no progress recorded for job '{name}'")]
  ProgressNotFound { name: String },

  /// The store configuration is unusable.
  #[error("invalid store config: {message}")]
  InvalidConfig { message: String },

  /// The database failed while running an operation.
  #[error("storage failure during {operation}: {source}")]
  Storage {
    operation: &'static str,
    #[source]
    source: sqlx::Error,
  },

  /// Schema initialization failed.
  #[error("migration failed: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
  /// Returns true for errors raised by the database itself rather than by
  /// the registry rules. The store never retries these.
  pub fn is_storage_failure(&self) -> bool {
    matches!(self, Self::Storage { .. } | Self::Migration(_))
  }
}

/// Wrap a database error with the name of the operation that hit it.
pub(crate) fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
  move |source| StoreError::Storage { operation, source }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_registry_errors_are_not_storage_failures() {
    let errors = [
      StoreError::JobExists {
        name: "a".to_string(),
      },
      StoreError::JobNotFound {
        name: "a".to_string(),
      },
      StoreError::ProgressNotFound {
        name: "a".to_string(),
      },
    ];

    for err in errors {
      assert!(!err.is_storage_failure(), "{err}");
    }
  }

  #[test]
  fn test_storage_error_carries_operation() {
    let err = storage("get_progress")(sqlx::Error::PoolClosed);

    assert!(err.is_storage_failure());
    assert!(err.to_string().starts_with("storage failure during get_progress"));
  }

  #[test]
  fn test_error_messages_name_the_job() {
    let err = StoreError::JobExists {
      name: "nightly-backup".to_string(),
    };
    assert_eq!(err.to_string(), "job 'nightly-backup' already exists");
  }
}

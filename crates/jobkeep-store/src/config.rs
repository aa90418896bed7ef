//! Store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Settings used to open a [`SqliteJobStore`](crate::SqliteJobStore).
///
/// Every field has a default, so a config file only needs the keys it wants
/// to change:
///
/// ```json
/// { "path": "/var/lib/jobkeep/jobs.db", "busy_timeout_ms": 10000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// Path to the SQLite database file.
  pub path: PathBuf,

  /// Maximum number of pooled connections.
  pub max_connections: u32,

  /// How long a statement waits on a locked database before failing.
  pub busy_timeout_ms: u64,

  /// Use write-ahead logging instead of a rollback journal.
  pub wal: bool,

  /// Create the database file if it does not exist.
  pub create_if_missing: bool,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      path: PathBuf::from("jobkeep.db"),
      max_connections: 4,
      busy_timeout_ms: 5_000,
      wal: true,
      create_if_missing: true,
    }
  }
}

impl StoreConfig {
  /// Default settings for a database at `path`.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      ..Self::default()
    }
  }

  /// Parse a config from a JSON document.
  pub fn from_json(content: &str) -> Result<Self, StoreError> {
    let config: Self = serde_json::from_str(content).map_err(|e| StoreError::InvalidConfig {
      message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Reject settings the pool cannot run with.
  pub fn validate(&self) -> Result<(), StoreError> {
    if self.max_connections == 0 {
      return Err(StoreError::InvalidConfig {
        message: "max_connections must be at least 1".to_string(),
      });
    }
    if self.path.as_os_str().is_empty() {
      return Err(StoreError::InvalidConfig {
        message: "path must not be empty".to_string(),
      });
    }
    Ok(())
  }

  pub fn busy_timeout(&self) -> Duration {
    Duration::from_millis(self.busy_timeout_ms)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_json_fills_defaults() {
    let config = StoreConfig::from_json(r#"{ "path": "/tmp/jobs.db" }"#).unwrap();

    assert_eq!(config.path, PathBuf::from("/tmp/jobs.db"));
    assert_eq!(config.max_connections, 4);
    assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    assert!(config.wal);
    assert!(config.create_if_missing);
  }

  #[test]
  fn test_from_json_overrides() {
    let config = StoreConfig::from_json(
      r#"{ "path": "jobs.db", "max_connections": 1, "busy_timeout_ms": 250, "wal": false }"#,
    )
    .unwrap();

    assert_eq!(config.max_connections, 1);
    assert_eq!(config.busy_timeout(), Duration::from_millis(250));
    assert!(!config.wal);
  }

  #[test]
  fn test_from_json_rejects_zero_connections() {
    let err = StoreConfig::from_json(r#"{ "max_connections": 0 }"#).unwrap_err();
    assert!(matches!(err, StoreError::InvalidConfig { .. }));
  }

  #[test]
  fn test_from_json_rejects_malformed_input() {
    let err = StoreConfig::from_json("{ path: ").unwrap_err();
    assert!(matches!(err, StoreError::InvalidConfig { .. }));
  }

  #[test]
  fn test_new_keeps_path() {
    let config = StoreConfig::new("data/jobs.db");
    assert_eq!(config.path, PathBuf::from("data/jobs.db"));
    assert_eq!(config.max_connections, StoreConfig::default().max_connections);
  }
}

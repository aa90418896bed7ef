use sqlx::FromRow;

/// A job as stored in the `jobs` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct JobRecord {
  pub job_name: String,
  pub job_info: String,
}

/// A progress marker as stored in the `progresses` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ProgressRecord {
  pub job_name: String,
  pub progress: String,
}

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use jobkeep_store::{JobStore, SqliteJobStore, StoreConfig, StoreError};

/// jobkeep - a durable registry of named jobs and their progress
#[derive(Parser)]
#[command(name = "jobkeep")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.jobkeep)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to the database file (default: <data_dir>/jobs.db)
  #[arg(long, global = true)]
  db: Option<PathBuf>,

  /// Path to a JSON store config file
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Register, update and inspect jobs
  Job {
    #[command(subcommand)]
    action: JobAction,
  },

  /// Record and read job progress
  Progress {
    #[command(subcommand)]
    action: ProgressAction,
  },
}

#[derive(Subcommand)]
enum JobAction {
  /// Register a new job
  Create {
    name: String,

    /// Job info (read from stdin when omitted)
    #[arg(long)]
    info: Option<String>,
  },

  /// Replace the info of an existing job
  Update {
    name: String,

    /// Job info (read from stdin when omitted)
    #[arg(long)]
    info: Option<String>,
  },

  /// Print whether a job is registered
  Exists { name: String },

  /// Print every job as a JSON object of name to info
  List,
}

#[derive(Subcommand)]
enum ProgressAction {
  /// Record progress for an existing job
  Set {
    name: String,

    /// Progress value (read from stdin when omitted)
    #[arg(long)]
    progress: Option<String>,
  },

  /// Print the recorded progress of a job
  Get { name: String },

  /// Print whether progress has been recorded for a job
  Exists { name: String },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  tracing_subscriber::registry()
    .with(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jobkeep=info,jobkeep_store=warn")),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr),
    )
    .init();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{:#}", e);
      ExitCode::from(exit_code(&e))
    }
  }
}

/// Registry refusals get their own exit codes so scripts can branch on them.
fn exit_code(err: &anyhow::Error) -> u8 {
  match err.downcast_ref::<StoreError>() {
    Some(StoreError::JobExists { .. }) => 3,
    Some(StoreError::JobNotFound { .. }) => 4,
    Some(StoreError::ProgressNotFound { .. }) => 5,
    _ => 1,
  }
}

fn run(cli: Cli) -> Result<()> {
  let Cli {
    data_dir,
    db,
    config,
    command,
  } = cli;

  let Some(command) = command else {
    println!("jobkeep - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async move {
    let config = load_config(config.as_deref(), db, data_dir).await?;
    run_command(command, &config).await
  })
}

/// Build the store config. The data directory is only consulted when neither
/// `--db` nor a config file names the database.
async fn load_config(
  config_file: Option<&Path>,
  db: Option<PathBuf>,
  data_dir: Option<PathBuf>,
) -> Result<StoreConfig> {
  let mut config = match config_file {
    Some(path) => {
      let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
      StoreConfig::from_json(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?
    }
    None => StoreConfig::default(),
  };

  if let Some(db) = db {
    config.path = db;
  } else if config_file.is_none() {
    config.path = resolve_data_dir(data_dir)?.join("jobs.db");
  }

  Ok(config)
}

fn resolve_data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
  match data_dir {
    Some(dir) => Ok(dir),
    None => Ok(
      dirs::home_dir()
        .context("could not determine home directory")?
        .join(".jobkeep"),
    ),
  }
}

async fn run_command(command: Commands, config: &StoreConfig) -> Result<()> {
  if let Some(parent) = config.path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create directory: {}", parent.display()))?;
  }

  let store = SqliteJobStore::connect(config)
    .await
    .with_context(|| format!("failed to open store: {}", config.path.display()))?;
  debug!(path = %config.path.display(), "store ready");

  let result = match command {
    Commands::Job { action } => run_job(&store, action).await,
    Commands::Progress { action } => run_progress(&store, action).await,
  };

  store.close().await;
  result
}

async fn run_job(store: &impl JobStore, action: JobAction) -> Result<()> {
  match action {
    JobAction::Create { name, info } => {
      let info = value_or_stdin(info, "--info")?;
      store.create_job(&name, &info).await?;
      eprintln!("Created job: {}", name);
    }
    JobAction::Update { name, info } => {
      let info = value_or_stdin(info, "--info")?;
      store.update_job(&name, &info).await?;
      eprintln!("Updated job: {}", name);
    }
    JobAction::Exists { name } => {
      println!("{}", store.job_exists(&name).await?);
    }
    JobAction::List => {
      let jobs = store.list_jobs().await?;
      let output: serde_json::Map<String, serde_json::Value> = jobs
        .into_iter()
        .map(|(name, info)| (name, serde_json::Value::String(info)))
        .collect();
      println!("{}", serde_json::to_string_pretty(&output)?);
    }
  }

  Ok(())
}

async fn run_progress(store: &impl JobStore, action: ProgressAction) -> Result<()> {
  match action {
    ProgressAction::Set { name, progress } => {
      let progress = value_or_stdin(progress, "--progress")?;
      store.set_progress(&name, &progress).await?;
      eprintln!("Recorded progress for job: {}", name);
    }
    ProgressAction::Get { name } => {
      println!("{}", store.get_progress(&name).await?);
    }
    ProgressAction::Exists { name } => {
      println!("{}", store.progress_exists(&name).await?);
    }
  }

  Ok(())
}

/// Use the flag value if given, otherwise read the whole of stdin.
fn value_or_stdin(value: Option<String>, flag: &str) -> Result<String> {
  use std::io::IsTerminal;

  if let Some(value) = value {
    return Ok(value);
  }

  if io::stdin().is_terminal() {
    bail!("pass {} or pipe the value on stdin", flag);
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read value from stdin")?;

  Ok(strip_trailing_newline(input))
}

/// Drop the single newline that `echo` and heredocs append.
fn strip_trailing_newline(mut input: String) -> String {
  if input.ends_with('\n') {
    input.pop();
    if input.ends_with('\r') {
      input.pop();
    }
  }
  input
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_strip_trailing_newline() {
    assert_eq!(strip_trailing_newline("50%\n".to_string()), "50%");
    assert_eq!(strip_trailing_newline("50%\r\n".to_string()), "50%");
    assert_eq!(strip_trailing_newline("a\n\n".to_string()), "a\n");
    assert_eq!(strip_trailing_newline("a".to_string()), "a");
  }

  #[test]
  fn test_exit_code_for_registry_errors() {
    let err = anyhow::Error::new(StoreError::JobNotFound {
      name: "a".to_string(),
    })
    .context("update failed");
    assert_eq!(exit_code(&err), 4);

    let err = anyhow::anyhow!("something else");
    assert_eq!(exit_code(&err), 1);
  }

  #[tokio::test]
  async fn test_load_config_defaults_to_data_dir() {
    let config = load_config(None, None, Some(PathBuf::from("/data")))
      .await
      .unwrap();
    assert_eq!(config.path, PathBuf::from("/data/jobs.db"));
  }

  #[tokio::test]
  async fn test_load_config_db_flag_skips_data_dir() {
    let config = load_config(None, Some(PathBuf::from("x.db")), None)
      .await
      .unwrap();
    assert_eq!(config.path, PathBuf::from("x.db"));
    assert_eq!(config.max_connections, StoreConfig::default().max_connections);
  }

  #[tokio::test]
  async fn test_load_config_db_flag_overrides_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file = temp_dir.path().join("store.json");
    tokio::fs::write(&file, r#"{ "path": "from-file.db", "busy_timeout_ms": 100 }"#)
      .await
      .unwrap();

    let config = load_config(Some(&file), Some(PathBuf::from("flag.db")), None)
      .await
      .unwrap();
    assert_eq!(config.path, PathBuf::from("flag.db"));
    assert_eq!(config.busy_timeout_ms, 100);
  }
}

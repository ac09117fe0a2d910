use asset_sync::config::{Config, RawConfig};
use asset_sync::error::{SyncError, EXIT_CONFIGURATION};
use asset_sync::gcp::GcpClient;
use asset_sync::poll::{PollPolicy, DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use asset_sync::{sync, VERSION};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Load jobs usually finish within seconds; poll them more often than tables
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);
const JOB_POLL_ATTEMPTS: u32 = 300;

/// Sync Cloud Asset Inventory into BigQuery
#[derive(Parser, Debug)]
#[command(name = "asset-sync", version, about, long_about = None)]
struct Args {
    /// Project owning the dataset (defaults to the gcloud project)
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: Option<String>,

    /// Comma separated asset types to list
    #[arg(long, env = "GOOGLE_CLOUD_ASSET_TYPES")]
    asset_types: Option<String>,

    /// projects/ID, folders/ID or organizations/ID
    #[arg(long, env = "GOOGLE_CLOUD_ASSET_SCOPE")]
    scope: Option<String>,

    /// Dataset id (default: gcp_asset_inventory_<scope kind>_<scope id>)
    #[arg(long, env = "GOOGLE_CLOUD_DATASET_ID")]
    dataset: Option<String>,

    /// Dataset location
    #[arg(long, env = "GOOGLE_CLOUD_DATASET_REGION")]
    dataset_region: Option<String>,

    /// List table id
    #[arg(long, env = "GOOGLE_CLOUD_INVENTORY_TABLE_ID")]
    inventory_table: Option<String>,

    /// Seconds between table readiness checks
    #[arg(long, env = "ASSET_SYNC_READY_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    ready_interval_secs: u64,

    /// Readiness checks before giving up
    #[arg(long, env = "ASSET_SYNC_READY_MAX_ATTEMPTS", default_value_t = DEFAULT_POLL_ATTEMPTS)]
    ready_max_attempts: u32,

    /// Log level
    #[arg(long, value_enum, env = "ASSET_SYNC_LOG_LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// tracing filter directives, overriding --log-level
    #[arg(long, env = "ASSET_SYNC_LOG_FILTER")]
    log_filter: Option<String>,

    /// Append logs to this file instead of stdout
    #[arg(long, env = "ASSET_SYNC_LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn raw_config(&self) -> RawConfig {
        RawConfig {
            project: self.project.clone(),
            asset_types: self.asset_types.clone(),
            scope: self.scope.clone(),
            dataset: self.dataset.clone(),
            dataset_region: self.dataset_region.clone(),
            inventory_table: self.inventory_table.clone(),
            ready_interval_secs: self.ready_interval_secs,
            ready_max_attempts: self.ready_max_attempts,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    filter: Option<&str>,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, SyncError> {
    let filter = match (filter, level.directive()) {
        (Some(directives), _) => EnvFilter::try_new(directives)
            .map_err(|err| SyncError::Configuration(format!("ASSET_SYNC_LOG_FILTER: {}", err)))?,
        (None, Some(directive)) => EnvFilter::new(directive),
        (None, None) => return Ok(None),
    };

    let (non_blocking, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|err| {
                    SyncError::Configuration(format!("cannot open log file {}: {}", path.display(), err))
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    tracing::info!("asset-sync {} started with log level: {:?}", VERSION, level);
    if let Some(path) = log_file {
        tracing::info!("Log file: {:?}", path);
    }

    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_filter.as_deref(), args.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            println!("Error: {err}");
            return ExitCode::from(EXIT_CONFIGURATION);
        }
    };

    let code = match execute(&args).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{}", err);
            println!("Error: {err}");
            err.exit_code()
        }
    };
    ExitCode::from(code)
}

async fn execute(args: &Args) -> Result<u8, SyncError> {
    let config = Config::resolve(args.raw_config())?;
    tracing::info!(
        "Using project: {}, scope: {}, dataset: {} ({})",
        config.project,
        config.scope,
        config.dataset,
        config.dataset_region
    );

    let client = GcpClient::new().await.map_err(SyncError::Credentials)?;
    let job_poll = PollPolicy::new(JOB_POLL_INTERVAL, JOB_POLL_ATTEMPTS);
    let summary = sync::run(&config, &client, job_poll).await?;

    let row_failures: usize = summary.reports.iter().map(|r| r.failures.len()).sum();
    tracing::info!(
        "Done: {} assets listed, {} types reconciled, {} types without a kind, {} row failures, {} type failures",
        summary.listed,
        summary.reports.len(),
        summary.unhandled_types.len(),
        row_failures,
        summary.failures.len()
    );
    Ok(summary.exit_code())
}

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::Table;
use shopdwh_core::clients::{ParquetDirectory, PostgresClient};
use shopdwh_core::config::{Config, ConfigError, ConnectionConfig, PipelineConfig};
use shopdwh_core::{registry, DestinationClient, DestinationEndpoint, SourceClient, SourceEndpoint};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod orchestrator;

use orchestrator::{run_job, PipelineJob, RetryPolicy, RunMode, RunOutcome};

const PREVIEW_ROWS: usize = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Shop data warehouse loader", long_about = None)]
struct Cli {
    /// Pipeline definitions
    #[arg(long, global = true, default_value = "shopdwh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the destination tables that have a transform
    Transforms,
    /// Run one or more configured pipelines
    Run(RunArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Pipeline names from the config file
    pipelines: Vec<String>,
    /// Run every configured pipeline
    #[arg(long, conflicts_with = "pipelines")]
    all: bool,
    /// Extract and transform only, then print a preview
    #[arg(long)]
    dry_run: bool,
    /// Override the configured retry count
    #[arg(long)]
    retries: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Transforms => {
            print_transforms();
            Ok(())
        }
        Command::Run(args) => handle_run(&cli.config, args),
    }
}

fn print_transforms() {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Destination", "Rule"]);
    for descriptor in registry().descriptors() {
        table.add_row(vec![descriptor.code, descriptor.description]);
    }
    println!("{table}");
}

fn handle_run(config_path: &Path, args: RunArgs) -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_path(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let selected: Vec<&PipelineConfig> = if args.all {
        config.pipelines.iter().collect()
    } else if args.pipelines.is_empty() {
        bail!("name at least one pipeline, or pass --all");
    } else {
        args.pipelines
            .iter()
            .map(|name| config.pipeline(name))
            .collect::<Result<Vec<_>, ConfigError>>()?
    };
    if selected.is_empty() {
        bail!("{} defines no pipelines", config_path.display());
    }

    let mut policy = RetryPolicy::from(config.retry);
    if let Some(retries) = args.retries {
        policy.retries = retries;
    }
    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Full
    };

    let lookup = |name: &str| env::var(name).ok();
    let source_client = source_client(&config.source)?;
    let source_credentials = config
        .source
        .credentials(lookup)
        .context("source credentials")?;
    let destination_client = destination_client(&config.destination)?;
    let destination_credentials = config
        .destination
        .credentials(lookup)
        .context("destination credentials")?;

    let mut summary = Table::new();
    summary.load_preset(UTF8_FULL_CONDENSED);
    summary.set_header(vec!["Pipeline", "Description", "Destination", "Status", "Rows"]);
    let mut failures = 0usize;

    for pipeline in selected {
        let job = PipelineJob {
            name: pipeline.name.clone(),
            source: SourceEndpoint {
                table: pipeline.source_table()?,
                client: Arc::clone(&source_client),
                credentials: source_credentials.clone(),
            },
            destination: DestinationEndpoint {
                table: pipeline.dest_table()?,
                client: Arc::clone(&destination_client),
                credentials: destination_credentials.clone(),
            },
        };
        let destination = job.destination.table.to_string();
        let description = pipeline.description.clone().unwrap_or_default();

        match run_job(&job, mode, &policy) {
            Ok(RunOutcome::Loaded(ack)) => {
                summary.add_row(vec![
                    pipeline.name.clone(),
                    description,
                    destination,
                    "loaded".to_string(),
                    ack.rows_written.to_string(),
                ]);
            }
            Ok(RunOutcome::Preview(frame)) => {
                println!("{} -> {}", pipeline.name, destination);
                println!("{}", frame.head(Some(PREVIEW_ROWS)));
                summary.add_row(vec![
                    pipeline.name.clone(),
                    description,
                    destination,
                    "dry run".to_string(),
                    frame.height().to_string(),
                ]);
            }
            Err(err) => {
                error!(pipeline = pipeline.name.as_str(), error = %err, "Pipeline failed");
                failures += 1;
                summary.add_row(vec![
                    pipeline.name.clone(),
                    description,
                    destination,
                    format!("failed: {err}"),
                    "-".to_string(),
                ]);
            }
        }
    }

    println!("{summary}");
    if failures > 0 {
        bail!("{failures} pipeline(s) failed");
    }
    info!("All pipelines finished");
    Ok(())
}

fn source_client(config: &ConnectionConfig) -> Result<Arc<dyn SourceClient>> {
    let client: Arc<dyn SourceClient> = match config {
        ConnectionConfig::Postgres {
            acquire_timeout_secs,
            ..
        } => Arc::new(postgres_client(*acquire_timeout_secs)?),
        ConnectionConfig::Parquet { path } => Arc::new(ParquetDirectory::new(path.clone())),
    };
    Ok(client)
}

fn destination_client(config: &ConnectionConfig) -> Result<Arc<dyn DestinationClient>> {
    let client: Arc<dyn DestinationClient> = match config {
        ConnectionConfig::Postgres {
            acquire_timeout_secs,
            ..
        } => Arc::new(postgres_client(*acquire_timeout_secs)?),
        ConnectionConfig::Parquet { path } => Arc::new(ParquetDirectory::new(path.clone())),
    };
    Ok(client)
}

fn postgres_client(acquire_timeout_secs: Option<u64>) -> Result<PostgresClient> {
    let client = PostgresClient::new().context("failed to start database runtime")?;
    Ok(match acquire_timeout_secs {
        Some(secs) => client.with_acquire_timeout(Duration::from_secs(secs)),
        None => client,
    })
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tsv2parquet::init::init_tracing;
use tsv2parquet::{discover_jobs, run_jobs, ConversionContext, RuntimeConfig};

/// Convert zipped tab-separated extracts into typed Parquet files
#[derive(Parser)]
#[command(name = "tsv2parquet")]
#[command(version)]
#[command(about = "Convert zipped tab-separated extracts into typed Parquet files", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dataset to convert: granted, pregrant, beta
    #[arg(short, long, value_name = "NAME")]
    dataset: Option<String>,

    /// Data release version used in output file names
    #[arg(long, value_name = "VERSION")]
    data_version: Option<String>,

    /// Build directory holding raw/ and converted/
    #[arg(short, long, value_name = "DIR")]
    build_dir: Option<PathBuf>,

    /// Directory of per-dataset schema artifacts
    #[arg(long, value_name = "DIR")]
    schema_dir: Option<PathBuf>,

    /// Maximum number of archives converted concurrently
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Convert at most N archives
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// List the jobs that would run, then exit
    #[arg(long)]
    dry_run: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load base configuration (file + environment)
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: Apply CLI overrides (highest priority) and re-validate
    apply_cli_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging);

    // Step 3: Enumerate jobs up front
    let mut jobs = discover_jobs(&config)?;
    if let Some(limit) = cli.limit {
        jobs.truncate(limit);
    }

    info!(
        dataset = %config.dataset.name,
        version = %config.dataset.version,
        jobs = jobs.len(),
        "Discovered archives"
    );

    if cli.dry_run {
        for job in &jobs {
            let status = if job.target_path.exists() {
                "skip"
            } else {
                "convert"
            };
            println!(
                "{}\t{}\t{}",
                status,
                job.archive_path.display(),
                job.target_path.display()
            );
        }
        return Ok(());
    }

    // Step 4: Run
    let total = jobs.len();
    let ctx = Arc::new(ConversionContext::new(config));
    let report = run_jobs(ctx, jobs).await?;

    for (table, message) in &report.failed {
        error!(table = %table, error = %message, "Job failed");
    }

    if !report.is_success() {
        anyhow::bail!("{} of {} conversion jobs failed", report.failed.len(), total);
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(dataset) = &cli.dataset {
        config.dataset.name = dataset.clone();
    }
    if let Some(version) = &cli.data_version {
        config.dataset.version = version.clone();
    }
    if let Some(dir) = &cli.build_dir {
        config.paths.build_dir = dir.clone();
    }
    if let Some(dir) = &cli.schema_dir {
        config.paths.schema_dir = dir.clone();
    }
    if let Some(workers) = cli.workers {
        config.runtime.workers = workers;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
}

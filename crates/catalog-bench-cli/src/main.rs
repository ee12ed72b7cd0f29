//! catalog-bench - load generator for Iceberg REST catalogs.
//!
//! Runs a weighted mix of namespace, table and view reads and property
//! updates against a catalog while a background task keeps the bearer token
//! fresh.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use catalog_bench_core::version::version_strings;
use catalog_bench_core::{run_benchmark, CatalogClient, Config, TreeDataset};

/// Bundled version resource
const VERSION_PROPERTIES: &str = include_str!("../resources/version.properties");

#[derive(Debug, Parser)]
#[command(
    name = "catalog-bench",
    about = "Mixed read/update load generator for Iceberg REST catalogs",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to ~/.config/catalog-bench/config.json)
    #[arg(long, global = true, env = "CATALOG_BENCH_CONFIG")]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the workload against the catalog
    Run(RunArgs),
    /// Print the dataset the workload would use
    Dataset {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    read_ratio: Option<u32>,

    #[arg(long)]
    write_ratio: Option<u32>,

    /// New iterations per second
    #[arg(long)]
    throughput: Option<f64>,

    /// Workload duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Give up if no token is obtained within this many seconds
    #[arg(long)]
    gate_timeout: Option<u64>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(v) = &self.base_url {
            config.connection.base_url = v.clone();
        }
        if let Some(v) = self.read_ratio {
            config.workload.read_ratio = v;
        }
        if let Some(v) = self.write_ratio {
            config.workload.write_ratio = v;
        }
        if let Some(v) = self.throughput {
            config.workload.throughput = v;
        }
        if let Some(v) = self.duration {
            config.workload.duration_secs = v;
        }
        if self.seed.is_some() {
            config.workload.seed = self.seed;
        }
        if self.gate_timeout.is_some() {
            config.refresh.gate_timeout_secs = self.gate_timeout;
        }
    }
}

/// Initialize the tracing subscriber: stderr always, plus `log_file` when given.
/// The returned guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // RUST_LOG controls the level (e.g. RUST_LOG=catalog_bench_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(stderr_layer).with(filter).init();
            Ok(None)
        }
    }
}

/// Clap command with `--version` backed by the version resource.
fn cli_command(versions: &[String]) -> Command {
    Cli::command().version(versions.join("\n"))
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let versions = version_strings(VERSION_PROPERTIES)
        .context("Failed to read bundled version resource")?;
    let mut command = cli_command(&versions);
    let matches = command.get_matches_mut();
    let cli = Cli::from_arg_matches(&matches).map_err(|e| e.format(&mut command))?;

    let _guard = init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Run(args)) => run(cli.config.as_deref(), &args).await,
        Some(Commands::Dataset { json }) => print_dataset(cli.config.as_deref(), json),
        None => {
            command.print_help()?;
            Ok(())
        }
    }
}

async fn run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    let dataset = TreeDataset::generate(config.dataset.clone())?;
    let client = Arc::new(CatalogClient::new(&config.connection)?);

    info!(
        base_url = %config.connection.base_url,
        namespaces = dataset.namespaces().len(),
        tables = dataset.tables().len(),
        views = dataset.views().len(),
        read_ratio = config.workload.read_ratio,
        write_ratio = config.workload.write_ratio,
        "catalog-bench starting"
    );

    let summary = run_benchmark(&config, &dataset, Arc::clone(&client), client).await?;
    summary.log();

    if let Some(path) = &args.report {
        summary.write_json(path)?;
        info!(path = %path.display(), "Report written");
    }
    Ok(())
}

fn print_dataset(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let dataset = TreeDataset::generate(config.dataset.clone())?;
    let catalogs = config.dataset.num_catalogs;

    if json {
        let value = serde_json::json!({
            "shape": dataset.shape(),
            "catalogs": catalogs,
            "namespaces": dataset.namespaces().len(),
            "tables": dataset.tables().len(),
            "views": dataset.views().len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Catalogs:   {}", catalogs);
    println!("Namespaces: {}", dataset.namespaces().len());
    println!("Tables:     {}", dataset.tables().len());
    println!("Views:      {}", dataset.views().len());
    Ok(())
}

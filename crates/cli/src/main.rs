//! Command-line entry point for tessera.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use tessera_core::config::AppConfig;
use tessera_core::{GridLayout, Partition, Permutation};
use tessera_pipeline::{
    PartitionStatus, Pipeline, SyncReport, UploadSummary, WindowOutcome,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Publish grid partitions to storage and an on-chain registry")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "TESSERA_CONFIG", default_value = "tessera.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
struct PartitionArgs {
    /// Partition row
    #[arg(long, requires = "col", conflicts_with = "neighborhood")]
    row: Option<u32>,

    /// Partition column
    #[arg(long, requires = "row")]
    col: Option<u32>,

    /// Partition number (row * partitions_per_row + col)
    #[arg(long, short = 'n')]
    neighborhood: Option<u32>,
}

impl PartitionArgs {
    fn is_set(&self) -> bool {
        self.neighborhood.is_some() || self.row.is_some()
    }

    fn resolve(&self, layout: &GridLayout) -> Result<Partition> {
        let partition = match (self.neighborhood, self.row, self.col) {
            (Some(number), _, _) => Partition::from_ordinal(number, layout.partitions_per_row()),
            (None, Some(row), Some(col)) => Partition::new(row, col),
            _ => bail!("select a partition with --neighborhood or --row and --col"),
        };
        if !layout.contains(partition) {
            bail!(
                "partition {partition} is outside the {}x{} partition grid",
                layout.partitions_per_col(),
                layout.partitions_per_row()
            );
        }
        Ok(partition)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload pending items of a partition
    Upload {
        #[command(flatten)]
        partition: PartitionArgs,
    },
    /// Write uploaded items of a partition to its registry
    Sync {
        #[command(flatten)]
        partition: PartitionArgs,
        /// Print the window report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Upload, then sync
    Publish {
        #[command(flatten)]
        partition: PartitionArgs,
        /// Print the window report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show progress of one partition, or of every cached partition
    Status {
        #[command(flatten)]
        partition: PartitionArgs,
    },
    /// Turn a partition walk (`x y` per line) into a permutation table
    GeneratePermutation {
        /// Path file to read
        #[arg(long)]
        path: PathBuf,
        /// Partition width (default: grid.partition_width)
        #[arg(long)]
        width: Option<u32>,
        /// Where to write the JSON table
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { config, command } = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&config)?;

    match command {
        Commands::Upload { partition } => {
            let partition = partition.resolve(&config.grid.layout())?;
            let pipeline = build_pipeline(&config).await?;
            let summary = pipeline
                .upload(partition)
                .await
                .with_context(|| format!("upload of partition {partition} failed"))?;
            print_upload(partition, &summary);
            if summary.interrupted {
                bail!("upload of partition {partition} was interrupted; re-run to resume");
            }
            Ok(())
        }
        Commands::Sync { partition, json } => {
            let partition = partition.resolve(&config.grid.layout())?;
            let pipeline = build_pipeline(&config).await?;
            let report = pipeline
                .sync(partition)
                .await
                .with_context(|| format!("sync of partition {partition} failed"))?;
            print_sync(partition, &report, json)?;
            ensure_complete(partition, &report)
        }
        Commands::Publish { partition, json } => {
            let partition = partition.resolve(&config.grid.layout())?;
            let pipeline = build_pipeline(&config).await?;
            let report = pipeline
                .publish(partition)
                .await
                .with_context(|| format!("publish of partition {partition} failed"))?;
            print_upload(partition, &report.upload);
            print_sync(partition, &report.sync, json)?;
            if report.upload.interrupted {
                bail!("upload of partition {partition} was interrupted; re-run to resume");
            }
            ensure_complete(partition, &report.sync)
        }
        Commands::Status { partition } => {
            let pipeline = build_pipeline(&config).await?;
            let partitions = if partition.is_set() {
                vec![partition.resolve(&config.grid.layout())?]
            } else {
                pipeline
                    .cache()
                    .partitions()
                    .await
                    .context("failed to read progress cache")?
            };
            if partitions.is_empty() {
                println!("No partitions in {}.", pipeline.cache().path().display());
                return Ok(());
            }
            print_status_header();
            for partition in partitions {
                let status = pipeline.status(partition).await?;
                print_status_row(&status);
            }
            Ok(())
        }
        Commands::GeneratePermutation {
            path,
            width,
            output,
        } => {
            let layout = config.grid.layout();
            let width = width.unwrap_or(layout.partition_width);
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read path file {}", path.display()))?;
            let permutation = Permutation::parse_path(&text, width)
                .with_context(|| format!("invalid path file {}", path.display()))?;
            if permutation.len() != layout.cells_per_partition() as usize {
                tracing::warn!(
                    entries = permutation.len(),
                    cells = layout.cells_per_partition(),
                    "Permutation does not cover the configured partition size"
                );
            }
            write_permutation(&output, &permutation)?;
            println!(
                "Wrote {} entries to {}",
                permutation.len(),
                output.display()
            );
            Ok(())
        }
    }
}

/// Layer the config file (optional) under `TESSERA_` environment variables.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path.display());
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("TESSERA_").ignore(&["CONFIG"]).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;
    Ok(config)
}

async fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    Pipeline::from_config(config)
        .await
        .context("failed to initialize pipeline")
}

fn write_permutation(output: &Path, permutation: &Permutation) -> Result<()> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec(permutation.as_slice())?;
    std::fs::write(output, json)
        .with_context(|| format!("failed to write {}", output.display()))
}

fn ensure_complete(partition: Partition, report: &SyncReport) -> Result<()> {
    if report.failed() > 0 {
        bail!(
            "{} registry window(s) of partition {partition} failed; re-run sync to retry",
            report.failed()
        );
    }
    Ok(())
}

fn print_upload(partition: Partition, summary: &UploadSummary) {
    println!(
        "Partition {partition}: {} pending, {} uploaded in {} batch(es)",
        summary.pending, summary.uploaded, summary.batches
    );
}

fn print_sync(partition: Partition, report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "Partition {partition}: {} window(s) written, {} skipped, {} not ready, {} failed",
        report.written(),
        report.skipped(),
        report.not_ready(),
        report.failed()
    );
    for window in &report.windows {
        if let WindowOutcome::Failed(reason) = &window.outcome {
            println!("  window {window}: {reason}");
        }
    }
    Ok(())
}

fn print_status_header() {
    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>8}  REGISTRY",
        "PARTITION", "ON DISK", "PENDING", "UPLOADED", "ON-CHAIN"
    );
    println!("{}", "-".repeat(72));
}

fn print_status_row(status: &PartitionStatus) {
    let registry = status
        .program
        .as_ref()
        .map(|program| program.registry_locator.as_str())
        .unwrap_or("-");
    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>8}  {registry}",
        status.partition.tag(),
        status.on_disk,
        status.counts.pending,
        status.counts.uploaded,
        status.counts.on_chain
    );
}

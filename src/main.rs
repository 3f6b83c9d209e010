//! CLI entry point for the reportfetch tool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reportfetch::{
    Aggregator, BatchStats, CsvStatusSink, DEFAULT_CONCURRENCY, DEFAULT_RETRY_BUDGET,
    DEFAULT_TIMEOUT_SECS, DownloadEngine, HttpClient, StatusSink, config, read_catalog,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Starting PDF report downloader");

    // File config supplies defaults for anything the CLI left unset.
    let file_config = config::load_default_file_config()?;
    debug!(?file_config, "file configuration loaded");

    let dest_dir = args
        .dest_dir
        .or(file_config.dest_dir)
        .unwrap_or_else(|| PathBuf::from("downloads"));
    let output_dir = args
        .output_dir
        .or(file_config.output_dir)
        .unwrap_or_else(|| PathBuf::from("output"));
    let concurrency = args
        .concurrency
        .map(|value| value as usize)
        .or(file_config.concurrency)
        .unwrap_or(DEFAULT_CONCURRENCY);
    let retry_budget = args
        .retry_budget
        .or(file_config.retry_budget)
        .unwrap_or(DEFAULT_RETRY_BUDGET);
    let timeout_secs = args
        .timeout_secs
        .or(file_config.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    std::fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Failed to create destination folder '{}'", dest_dir.display()))?;
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output folder '{}'", output_dir.display()))?;

    let items = read_catalog(&args.catalog)?;
    if items.is_empty() {
        info!("Catalog contains no usable rows, nothing to do");
        return Ok(());
    }
    info!(items = items.len(), "Set reports to download");

    let sink: Arc<dyn StatusSink> = Arc::new(CsvStatusSink::new(&output_dir)?);
    let aggregator = Arc::new(Aggregator::new(sink));
    let client = Arc::new(HttpClient::with_timeout(
        &dest_dir,
        Duration::from_secs(timeout_secs),
    ));
    let engine = DownloadEngine::new(concurrency, retry_budget)?;
    let stats = Arc::new(BatchStats::new());

    // Progress bar fed off the engine's monotonically increasing
    // completed-count.
    let total = items.len() as u64;
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template("{wide_bar} {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let ticker = {
        let stats = Arc::clone(&stats);
        let progress = progress.clone();
        tokio::spawn(async move {
            loop {
                progress.set_position(stats.processed() as u64);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        })
    };

    let run_result = engine
        .run(items, client, Arc::clone(&aggregator), Arc::clone(&stats))
        .await;

    ticker.abort();
    progress.set_position(stats.processed() as u64);
    progress.finish();
    run_result?;

    let (succeeded, failed) = aggregator.totals();
    info!(succeeded, failed, total = succeeded + failed, "Download complete");

    Ok(())
}

//! CLI entry point for the drivefetch tool.

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use drivefetch_core::download::{FanoutProgressSink, LoggingProgressSink};
use drivefetch_core::{
    ChannelProgressSink, ErrorKind, TransferEngine, TransferError, TransferResult, VideoStorage,
    extract_file_id,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{load_default_file_config, resolve_log_level, resolve_transfer_config};
use cli::Args;

/// Buffered progress events per transfer before the sink starts dropping.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_default_file_config()?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = resolve_log_level(&args, loaded.config.as_ref());
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");
    if let Some(path) = loaded.path.as_deref() {
        debug!(
            path = %path.display(),
            loaded = loaded.loaded_from_file(),
            verbosity = loaded
                .config
                .as_ref()
                .and_then(|cfg| cfg.verbosity)
                .map_or("unset", app_config::VerbositySetting::as_str),
            "config file resolved"
        );
    }

    let references = read_references(&args)?;
    if references.is_empty() {
        info!("No input provided. Pass share links as arguments or pipe them via stdin.");
        info!("Example: drivefetch 'https://drive.google.com/file/d/<id>/view'");
        return Ok(ExitCode::SUCCESS);
    }

    let failed = if args.id_only {
        print_identifiers(&references, args.json)
    } else {
        let config = resolve_transfer_config(&args, loaded.config.as_ref());
        VideoStorage::new(config.storage_dir.clone())
            .ensure_dir()
            .await
            .with_context(|| {
                format!(
                    "Failed to create storage directory {}",
                    config.storage_dir.display()
                )
            })?;
        let engine = config
            .build_engine()
            .context("Failed to build transfer engine")?;
        info!(
            references = references.len(),
            strategy = engine.strategy_name(),
            "Drivefetch starting"
        );
        let show_progress = !args.no_progress && !args.quiet;
        download_all(&engine, &references, show_progress, args.json).await
    };

    info!(
        total = references.len(),
        failed,
        succeeded = references.len() - failed,
        "Drivefetch finished"
    );
    if failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Collects references from positional args, or one per line from stdin.
///
/// Blank lines and `#` comment lines are skipped.
fn read_references(args: &Args) -> Result<Vec<String>> {
    let raw = if !args.references.is_empty() {
        args.references.join("\n")
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read references from stdin")?;
        buffer
    } else {
        String::new()
    };

    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn print_identifiers(references: &[String], as_json: bool) -> usize {
    let mut failed = 0;
    for reference in references {
        match extract_file_id(reference) {
            Ok(file_id) if as_json => {
                println!(
                    "{}",
                    json!({ "reference": reference, "status": "ok", "file_id": file_id })
                );
            }
            Ok(file_id) => println!("{file_id}"),
            Err(error) => {
                failed += 1;
                report_failure(reference, error.kind(), &error.to_string(), as_json);
            }
        }
    }
    failed
}

async fn download_all(
    engine: &TransferEngine,
    references: &[String],
    show_progress: bool,
    as_json: bool,
) -> usize {
    let mut failed = 0;
    for reference in references {
        match download_one(engine, reference, show_progress).await {
            Ok(result) if as_json => {
                println!(
                    "{}",
                    json!({ "reference": reference, "status": "ok", "result": result })
                );
            }
            Ok(result) => {
                println!(
                    "{} ({} bytes)",
                    result.storage_path.display(),
                    result.byte_size
                );
            }
            Err(error) => {
                failed += 1;
                report_failure(reference, error.kind(), &error.to_string(), as_json);
            }
        }
    }
    failed
}

async fn download_one(
    engine: &TransferEngine,
    reference: &str,
    show_progress: bool,
) -> Result<TransferResult, TransferError> {
    let (channel, mut events) = ChannelProgressSink::channel(PROGRESS_CHANNEL_CAPACITY);
    let sink = FanoutProgressSink::new()
        .with(Arc::new(channel))
        .with(Arc::new(LoggingProgressSink));

    let bar = if show_progress {
        ProgressBar::new(100)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let bar_task = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                bar.set_message(format!("{} {}", event.display_name, event.identifier));
                bar.set_position(u64::from(event.percent_complete));
            }
        })
    };

    let result = engine.download_reference(reference, Some(&sink)).await;
    // Closes the channel so the bar task drains and exits.
    drop(sink);
    if let Err(error) = bar_task.await {
        warn!(error = %error, "progress display task failed");
    }
    bar.finish_and_clear();
    result
}

fn report_failure(reference: &str, kind: ErrorKind, message: &str, as_json: bool) {
    if as_json {
        println!(
            "{}",
            json!({
                "reference": reference,
                "status": "error",
                "kind": kind,
                "message": message,
            })
        );
        return;
    }
    let descriptor = kind.describe();
    eprintln!("error [{}]: {message}", kind.label());
    eprintln!("  What: {}", descriptor.what);
    eprintln!("  Why:  {}", descriptor.why);
    eprintln!("  Fix:  {}", descriptor.fix);
}

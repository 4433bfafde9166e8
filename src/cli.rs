//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use drivefetch_core::FetchStrategy;

/// Fetch files shared through cloud-drive links into a local video directory.
///
/// Accepts share links (…/file/d/<id>/view, …?id=<id>, …/d/<id>) or bare file
/// identifiers, as arguments or one per line on stdin.
#[derive(Parser, Debug)]
#[command(name = "drivefetch")]
#[command(author, version, about)]
pub struct Args {
    /// Share links or file identifiers
    pub references: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Directory to store downloaded files in
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Transfer strategy: direct (HTTP) or subprocess (external tool)
    #[arg(short = 's', long)]
    pub strategy: Option<FetchStrategy>,

    /// Overall transfer timeout in seconds (1-3600)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// External download program for the subprocess strategy
    #[arg(long)]
    pub program: Option<String>,

    /// Service base URL (for mirrors or testing)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Only print the extracted file identifiers; do not download
    #[arg(long)]
    pub id_only: bool,

    /// Print each transfer result as a JSON line
    #[arg(long)]
    pub json: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

//! Delegated strategy: hand the transfer to an external download program.
//!
//! The program is invoked as
//! `<program> [leading args] <service url> -O <temp path> --fuzzy`.
//! Percentage tokens on its standard output drive progress; standard error is
//! collected for failure diagnostics.

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::constants::{DEFAULT_SERVICE_BASE_URL, DEFAULT_SUBPROCESS_PROGRAM, TRANSFER_TIMEOUT_SECS};
use super::error::TransferError;
use super::fetcher::{FetchOutcome, Fetcher};
use super::progress::ProgressTracker;
use crate::parser::FileId;

/// Digits immediately followed by `%`; a fractional part is tolerated and dropped.
#[allow(clippy::expect_used)]
static PERCENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.\d+)?%").expect("percent regex is valid"));

/// Longest run of output kept while waiting for a line break.
const MAX_PENDING_BYTES: usize = 8 * 1024;

/// Fetcher that delegates to an external command-line download tool.
#[derive(Debug, Clone)]
pub struct SubprocessFetcher {
    program: String,
    leading_args: Vec<String>,
    base_url: String,
    timeout: Duration,
}

impl Default for SubprocessFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_SUBPROCESS_PROGRAM)
    }
}

impl SubprocessFetcher {
    /// Creates a fetcher running `program` with the default timeout.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            base_url: DEFAULT_SERVICE_BASE_URL.to_string(),
            timeout: Duration::from_secs(TRANSFER_TIMEOUT_SECS),
        }
    }

    /// Arguments placed before the service URL (e.g. a script path for an interpreter).
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overall bound on the subprocess run.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL used to build the service URL handed to the program.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Program that will be launched.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Service URL passed to the program for `file_id`.
    #[must_use]
    pub fn source_url(&self, file_id: &FileId) -> String {
        format!("{}/uc?id={file_id}", self.base_url.trim_end_matches('/'))
    }

    fn command(&self, url: &str, temp_path: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .arg(url)
            .arg("-O")
            .arg(temp_path)
            .arg("--fuzzy")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Fetcher for SubprocessFetcher {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    #[instrument(skip(self, temp_path, progress), fields(strategy = "subprocess", program = %self.program, file_id = %file_id))]
    async fn fetch(
        &self,
        file_id: &FileId,
        temp_path: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<FetchOutcome, TransferError> {
        let url = self.source_url(file_id);
        debug!(url = %url, "launching download program");

        let mut child = self
            .command(&url, temp_path)
            .spawn()
            .map_err(|e| TransferError::process_launch(&self.program, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both pipes are drained inside the deadline: a descendant that
        // inherits stderr must not outlive the timeout.
        let run = async {
            let pump = async {
                if let Some(stdout) = stdout
                    && let Err(error) = pump_progress(stdout, progress).await
                {
                    debug!(%error, "stdout read interrupted");
                }
            };
            let collect = async {
                let mut buf = Vec::new();
                if let Some(mut stderr) = stderr
                    && let Err(error) = stderr.read_to_end(&mut buf).await
                {
                    debug!(%error, "stderr read interrupted");
                }
                buf
            };
            let ((), diagnostic, status) = tokio::join!(pump, collect, child.wait());
            status.map(|status| (status, diagnostic))
        };

        let waited = tokio::time::timeout(self.timeout, run).await;
        let (status, diagnostic) = match waited {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => return Err(TransferError::io(temp_path, e)),
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "download program timed out; killing");
                if let Err(error) = child.kill().await {
                    debug!(%error, "kill after timeout failed");
                }
                return Err(TransferError::timeout(file_id.as_str(), self.timeout));
            }
        };
        let stderr = String::from_utf8_lossy(&diagnostic);

        if status.success() {
            info!("download program finished");
            Ok(FetchOutcome::default())
        } else {
            debug!(exit_code = ?status.code(), "download program failed");
            Err(TransferError::from_diagnostic(
                file_id.as_str(),
                status.code(),
                &stderr,
            ))
        }
    }
}

/// Reads `reader` to the end, feeding every percentage token to `progress`.
///
/// Output is split on both `\n` and `\r` since progress bars redraw in place.
async fn pump_progress<R>(mut reader: R, progress: &mut ProgressTracker<'_>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);
        while let Some(pos) = pending.iter().position(|b| matches!(b, b'\n' | b'\r')) {
            let segment: Vec<u8> = pending.drain(..=pos).collect();
            observe_segment(&segment, progress);
        }
        if pending.len() > MAX_PENDING_BYTES {
            // Flush up to the last byte that cannot continue a percentage token.
            let cut = pending
                .iter()
                .rposition(|b| !(b.is_ascii_digit() || *b == b'.'))
                .map_or(pending.len(), |pos| pos + 1);
            let segment: Vec<u8> = pending.drain(..cut).collect();
            observe_segment(&segment, progress);
        }
    }

    if !pending.is_empty() {
        observe_segment(&pending, progress);
    }
    Ok(())
}

fn observe_segment(segment: &[u8], progress: &mut ProgressTracker<'_>) {
    let text = String::from_utf8_lossy(segment);
    for captures in PERCENT_PATTERN.captures_iter(&text) {
        if let Ok(percent) = captures[1].parse::<u64>() {
            progress.observe_percent(percent);
        }
    }
}

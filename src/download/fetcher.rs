//! Transfer strategies.
//!
//! A [`Fetcher`] moves the remote bytes for one identifier into a temporary
//! path and reports raw progress. Validation, promotion, and cleanup live in
//! the engine and are shared by every strategy.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;

use super::error::TransferError;
use super::progress::ProgressTracker;
use crate::parser::FileId;

/// What a strategy observed about a completed transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Bytes written by the strategy itself, when it counts them.
    pub bytes_written: Option<u64>,
    /// Size announced by the remote side, when known.
    pub content_length: Option<u64>,
}

/// One way of fetching a remote file into a local temporary path.
#[async_trait]
pub trait Fetcher: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Fetches `file_id` into `temp_path`, feeding `progress` along the way.
    ///
    /// Returning `Ok` is a success signal only; the engine still checks that
    /// the file exists and is non-empty.
    async fn fetch(
        &self,
        file_id: &FileId,
        temp_path: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<FetchOutcome, TransferError>;
}

/// Selectable transfer strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Streamed HTTP GET against the export endpoint.
    #[default]
    Direct,
    /// Delegation to an external download program.
    Subprocess,
}

impl FetchStrategy {
    /// Stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Subprocess => "subprocess",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" | "http" => Ok(Self::Direct),
            "subprocess" | "delegated" => Ok(Self::Subprocess),
            other => Err(format!(
                "unknown strategy '{other}' (expected 'direct' or 'subprocess')"
            )),
        }
    }
}

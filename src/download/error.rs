//! Error types for the transfer pipeline.
//!
//! Each variant is tagged with its [`ErrorKind`] where the raw diagnostic is
//! first observed: the HTTP status, the reqwest error, or the subprocess exit
//! code and stderr. Callers match on [`TransferError::kind`] instead of
//! inspecting message text.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::failure::ErrorKind;
use crate::parser::ParseError;

/// Maximum number of diagnostic characters kept from subprocess stderr.
const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// Errors that can occur while fetching and storing a shared file.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The share reference could not be turned into a file identifier.
    #[error(transparent)]
    InvalidReference(#[from] ParseError),

    /// The file is private or sharing is disabled.
    #[error("access denied for file {file_id} ({detail}): file is private or sharing is disabled")]
    AccessDenied {
        /// Identifier of the requested file.
        file_id: String,
        /// Raw diagnostic (status line or subprocess output).
        detail: String,
    },

    /// The service has no file with this identifier.
    #[error("file {file_id} not found ({detail})")]
    NotFound {
        /// Identifier of the requested file.
        file_id: String,
        /// Raw diagnostic (status line or subprocess output).
        detail: String,
    },

    /// DNS resolution or connection establishment failed.
    #[error("network error: unable to connect to {url}: {source}")]
    NetworkUnavailable {
        /// The URL that could not be reached.
        url: String,
        /// The underlying connection error.
        #[source]
        source: reqwest::Error,
    },

    /// The transfer did not finish within the configured window.
    #[error("timeout downloading file {file_id} after {}s: file might be too large or connection is slow", .timeout.as_secs())]
    Timeout {
        /// Identifier of the requested file.
        file_id: String,
        /// The overall timeout that elapsed.
        timeout: Duration,
    },

    /// The transfer reported success but produced no usable file.
    #[error(
        "downloaded file {file_id} is empty or missing at {path}: file might be private or not accessible"
    )]
    EmptyArtifact {
        /// Identifier of the requested file.
        file_id: String,
        /// Temporary path that was checked.
        path: PathBuf,
    },

    /// The external download program could not be started.
    #[error("failed to launch download program '{program}': {source}")]
    ProcessLaunch {
        /// Program that failed to start.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The external download program exited unsuccessfully.
    #[error("download program exited with {} for file {file_id}: {stderr}", .exit_code.map_or_else(|| "signal".to_string(), |c| format!("code {c}")))]
    ProcessFailed {
        /// Identifier of the requested file.
        file_id: String,
        /// Exit code, or `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured (truncated) standard error.
        stderr: String,
    },

    /// The service answered with an unexpected HTTP status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The export URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Transport failure that is neither a timeout nor a connection failure.
    #[error("download failed for {url}: {source}")]
    Transport {
        /// The URL being downloaded.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// File system error while writing, inspecting, or promoting the artifact.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// Maps an HTTP error status to the matching failure.
    ///
    /// 403 means the file is private, 404 that it does not exist; every other
    /// status is a generic failure.
    pub fn from_status(file_id: impl Into<String>, url: impl Into<String>, status: u16) -> Self {
        match status {
            403 => Self::AccessDenied {
                file_id: file_id.into(),
                detail: format!("HTTP {status}"),
            },
            404 => Self::NotFound {
                file_id: file_id.into(),
                detail: format!("HTTP {status}"),
            },
            _ => Self::HttpStatus {
                url: url.into(),
                status,
            },
        }
    }

    /// Maps a reqwest error observed while requesting or streaming.
    pub fn from_reqwest(
        file_id: impl Into<String>,
        url: impl Into<String>,
        timeout: Duration,
        source: reqwest::Error,
    ) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                file_id: file_id.into(),
                timeout,
            }
        } else if source.is_connect() {
            Self::NetworkUnavailable {
                url: url.into(),
                source,
            }
        } else if let Some(status) = source.status() {
            Self::from_status(file_id, url, status.as_u16())
        } else {
            Self::Transport {
                url: url.into(),
                source,
            }
        }
    }

    /// Maps an unsuccessful subprocess exit using its stderr text.
    ///
    /// Permission/forbidden phrases mean access denied, not-found phrases mean
    /// the file is missing; anything else keeps the raw diagnostic.
    pub fn from_diagnostic(
        file_id: impl Into<String>,
        exit_code: Option<i32>,
        stderr: &str,
    ) -> Self {
        let file_id = file_id.into();
        let detail = truncate_diagnostic(stderr);
        let lowered = stderr.to_lowercase();

        if ["permission denied", "forbidden", "access denied"]
            .iter()
            .any(|phrase| lowered.contains(phrase))
        {
            Self::AccessDenied { file_id, detail }
        } else if ["not found", "does not exist"]
            .iter()
            .any(|phrase| lowered.contains(phrase))
        {
            Self::NotFound { file_id, detail }
        } else {
            Self::ProcessFailed {
                file_id,
                exit_code,
                stderr: detail,
            }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(file_id: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            file_id: file_id.into(),
            timeout,
        }
    }

    /// Creates an empty-or-missing artifact error.
    pub fn empty_artifact(file_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::EmptyArtifact {
            file_id: file_id.into(),
            path: path.into(),
        }
    }

    /// Creates a process-launch error.
    pub fn process_launch(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::ProcessLaunch {
            program: program.into(),
            source,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Failure category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference(err) => err.kind(),
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::NotFound { .. } => ErrorKind::FileNotFound,
            Self::NetworkUnavailable { .. } => ErrorKind::NetworkUnavailable,
            Self::Timeout { .. } => ErrorKind::TransferTimedOut,
            Self::EmptyArtifact { .. } => ErrorKind::EmptyOrMissingArtifact,
            Self::ProcessLaunch { .. } => ErrorKind::ProcessLaunchFailure,
            Self::ProcessFailed { .. }
            | Self::HttpStatus { .. }
            | Self::Transport { .. }
            | Self::Io { .. } => ErrorKind::TransferFailed,
        }
    }
}

/// Errors raised while constructing a transfer strategy.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The service base URL is not an absolute http(s) URL.
    #[error("invalid service base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

fn truncate_diagnostic(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= MAX_DIAGNOSTIC_CHARS {
        return trimmed.to_string();
    }
    // Keep the tail; tools print the fatal line last.
    trimmed.chars().skip(count - MAX_DIAGNOSTIC_CHARS).collect()
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs
// context (file id, url, path) the source errors don't carry.

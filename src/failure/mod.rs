//! Failure classification and user-facing descriptors for transfer errors.
//!
//! Every error surfaced by the library maps to exactly one [`ErrorKind`].
//! The kind is decided where the raw diagnostic is first observed and is
//! never re-derived from message text afterwards.

use std::fmt;

use serde::Serialize;

/// Abstract failure categories reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Input matched none of the recognized identifier patterns.
    InvalidReferenceFormat,
    /// Remote file is private or sharing is disabled.
    AccessDenied,
    /// Remote file does not exist.
    FileNotFound,
    /// DNS or connection failure reaching the remote service.
    NetworkUnavailable,
    /// Overall transfer exceeded the configured timeout.
    TransferTimedOut,
    /// Local artifact absent or zero-length after a nominally successful transfer.
    EmptyOrMissingArtifact,
    /// The download subprocess could not be started.
    ProcessLaunchFailure,
    /// Any other transport or process failure.
    TransferFailed,
}

impl ErrorKind {
    /// Stable machine-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::InvalidReferenceFormat => "invalid_reference_format",
            Self::AccessDenied => "access_denied",
            Self::FileNotFound => "file_not_found",
            Self::NetworkUnavailable => "network_unavailable",
            Self::TransferTimedOut => "transfer_timed_out",
            Self::EmptyOrMissingArtifact => "empty_or_missing_artifact",
            Self::ProcessLaunchFailure => "process_launch_failure",
            Self::TransferFailed => "transfer_failed",
        }
    }

    /// Human-readable explanation of what went wrong and how to fix it.
    #[must_use]
    pub fn describe(self) -> FailureDescriptor {
        match self {
            Self::InvalidReferenceFormat => FailureDescriptor {
                what: "Input could not be parsed",
                why: "The value is neither a recognized share link nor a bare file identifier.",
                fix: "Paste the full share link (…/file/d/<id>/view) or the file identifier itself.",
            },
            Self::AccessDenied => FailureDescriptor {
                what: "Access denied",
                why: "The file is private or link sharing is disabled.",
                fix: "Make sure the file is shared with \"Anyone with the link\" and retry.",
            },
            Self::FileNotFound => FailureDescriptor {
                what: "File not found",
                why: "The service has no file with this identifier.",
                fix: "Check the share link; the file may have been moved or deleted.",
            },
            Self::NetworkUnavailable => FailureDescriptor {
                what: "Network request failed",
                why: "DNS resolution or the connection to the service failed.",
                fix: "Check connectivity/VPN settings, then rerun.",
            },
            Self::TransferTimedOut => FailureDescriptor {
                what: "Download timed out",
                why: "The file might be too large or the connection too slow for the timeout window.",
                fix: "Increase the timeout (--timeout) or retry on a faster connection.",
            },
            Self::EmptyOrMissingArtifact => FailureDescriptor {
                what: "Downloaded file is empty",
                why: "The transfer produced no data, which usually means the file is private or not accessible.",
                fix: "Verify the file is publicly shared and retry.",
            },
            Self::ProcessLaunchFailure => FailureDescriptor {
                what: "Download tool could not be started",
                why: "The external download program is missing or not executable.",
                fix: "Install the tool or point --program at it, or use --strategy direct.",
            },
            Self::TransferFailed => FailureDescriptor {
                what: "Download failed",
                why: "The transfer failed for a reason not covered by a more specific category.",
                fix: "Inspect the diagnostic and logs (-v), then rerun.",
            },
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-facing description of a failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureDescriptor {
    /// What went wrong, in one sentence.
    pub what: &'static str,
    /// The likely cause.
    pub why: &'static str,
    /// What the user can do about it.
    pub fix: &'static str,
}

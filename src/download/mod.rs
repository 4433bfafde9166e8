//! Transfer pipeline for shared cloud-drive files.
//!
//! This module fetches a file by identifier into a temporary artifact,
//! validates it, and atomically promotes it into the storage directory under
//! a collision-free name.
//!
//! # Features
//!
//! - Two interchangeable strategies behind the [`Fetcher`] trait:
//!   [`HttpFetcher`] (streamed export download) and [`SubprocessFetcher`]
//!   (delegation to an external tool such as `gdown`)
//! - Monotonic, deduplicated progress events via [`ProgressSink`]
//! - Structured errors with a single [`ErrorKind`](crate::failure::ErrorKind) per failure
//! - No orphaned temporary files, on error or cancellation

mod client;
pub mod constants;
mod engine;
mod error;
mod fetcher;
mod progress;
mod storage;
mod subprocess;

pub use client::{HttpFetcher, HttpFetcherOptions};
pub use engine::{TransferEngine, TransferResult, TransferState, canonical_file_name};
pub use error::{BuildError, TransferError};
pub use fetcher::{FetchOutcome, FetchStrategy, Fetcher};
pub use progress::{
    ChannelProgressSink, FanoutProgressSink, LoggingProgressSink, ProgressSink, ProgressTracker,
    TransferProgress,
};
pub use storage::{ArtifactStore, TemporaryArtifact, VideoStorage};
pub use subprocess::SubprocessFetcher;

// Note: no module-local Result alias; use `Result<T, TransferError>` explicitly.

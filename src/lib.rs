//! Drivefetch Core Library
//!
//! Fetches files shared through a cloud-drive link into a managed local
//! storage directory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`parser`] - Share-link to file-identifier extraction (pure, no I/O)
//! - [`download`] - Transfer engine, strategies, progress, and storage
//! - [`failure`] - Error categories and user-facing descriptors
//! - [`config`] - Engine configuration and assembly

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod failure;
pub mod parser;

// Re-export commonly used types
pub use config::TransferConfig;
pub use download::{
    ChannelProgressSink, FetchStrategy, Fetcher, HttpFetcher, ProgressSink, SubprocessFetcher,
    TransferEngine, TransferError, TransferProgress, TransferResult, VideoStorage,
};
pub use failure::ErrorKind;
pub use parser::{FileId, ParseError, extract_file_id};

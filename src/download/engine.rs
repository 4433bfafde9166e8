//! Transfer engine: fetch, validate, and promote one shared file.
//!
//! The engine drives a single transfer attempt through
//! `Idle -> InProgress -> {Succeeded, Failed}`. The [`Fetcher`] strategy only
//! moves bytes into a temporary path; everything after that (existence and
//! size checks, unique naming, the atomic rename, cleanup on failure) happens
//! here, once, for every strategy.
//!
//! No retries are performed. Dropping the returned future cancels the
//! transfer; the temporary artifact is removed on drop and a delegated
//! subprocess is killed.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use drivefetch_core::download::{HttpFetcher, TransferEngine, VideoStorage};
//! use drivefetch_core::parser::extract_file_id;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = VideoStorage::new("./videos");
//! storage.ensure_dir().await?;
//! let engine = TransferEngine::new(Box::new(HttpFetcher::new()), Arc::new(storage));
//!
//! let id = extract_file_id("https://drive.google.com/file/d/1AbCdEfGhIjKlMnOpQrStUvWxYz1234567/view")?;
//! let result = engine.download_file(&id, None).await?;
//! println!("stored {} ({} bytes)", result.stored_name, result.byte_size);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::constants::{
    PROGRESS_DISPLAY_NAME, STORED_CONTENT_TYPE, STORED_EXTENSION, STORED_NAME_PREFIX,
};
use super::error::TransferError;
use super::fetcher::Fetcher;
use super::progress::{ProgressSink, ProgressTracker};
use super::storage::{ArtifactStore, TemporaryArtifact};
use crate::parser::{FileId, extract_file_id};

/// Durable record of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    /// Collision-free name the artifact was stored under.
    pub stored_name: String,
    /// Canonical name derived from the identifier (`gdrive_<id>.mp4`).
    pub original_name: String,
    /// Full path of the stored artifact.
    pub storage_path: PathBuf,
    /// Media type of the stored artifact.
    pub content_type: String,
    /// Size of the stored artifact in bytes.
    pub byte_size: u64,
}

/// Lifecycle of one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// No transfer has started yet.
    Idle,
    /// A fetch is running or its artifact is being validated.
    InProgress,
    /// The artifact was promoted into storage.
    Succeeded,
    /// The transfer ended with an error and left nothing behind.
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        })
    }
}

impl TransferState {
    fn advance(&mut self, next: Self) {
        debug!(from = %self, to = %next, "transfer state");
        *self = next;
    }
}

/// Canonical stored name for an identifier.
#[must_use]
pub fn canonical_file_name(file_id: &FileId) -> String {
    format!("{STORED_NAME_PREFIX}{file_id}.{STORED_EXTENSION}")
}

/// Downloads shared files into an [`ArtifactStore`] using a [`Fetcher`] strategy.
///
/// Holds no per-transfer state, so one engine can run any number of
/// transfers concurrently.
pub struct TransferEngine {
    fetcher: Box<dyn Fetcher>,
    store: Arc<dyn ArtifactStore>,
}

impl fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEngine")
            .field("fetcher", &self.fetcher)
            .field("store", &self.store)
            .finish()
    }
}

impl TransferEngine {
    /// Creates an engine from a strategy and a storage collaborator.
    #[must_use]
    pub fn new(fetcher: Box<dyn Fetcher>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { fetcher, store }
    }

    /// Name of the configured strategy.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.fetcher.name()
    }

    /// Storage collaborator used by this engine.
    #[must_use]
    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    /// Extracts the identifier from `reference` and downloads it.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidReference`] when the reference cannot
    /// be parsed, otherwise the same errors as
    /// [`download_file`](Self::download_file).
    pub async fn download_reference(
        &self,
        reference: &str,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<TransferResult, TransferError> {
        let file_id = extract_file_id(reference)?;
        self.download_file(&file_id, sink).await
    }

    /// Downloads `file_id` into the store.
    ///
    /// Progress events go to `sink` while the transfer is in progress. On any
    /// failure the temporary artifact is removed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`]; use [`TransferError::kind`] for the category.
    #[must_use = "transfer result describes the stored file"]
    #[instrument(skip(self, sink), fields(file_id = %file_id, strategy = self.fetcher.name()))]
    pub async fn download_file(
        &self,
        file_id: &FileId,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<TransferResult, TransferError> {
        let mut state = TransferState::Idle;
        let mut artifact = TemporaryArtifact::new(self.store.allocate_temp_path());
        let mut progress = ProgressTracker::new(file_id.as_str(), PROGRESS_DISPLAY_NAME, sink);
        debug!(temp_path = %artifact.path().display(), "allocated temporary artifact");

        state.advance(TransferState::InProgress);
        progress.start();
        let outcome = self.run(file_id, &mut artifact, &mut progress).await;
        progress.finish();

        match outcome {
            Ok(result) => {
                state.advance(TransferState::Succeeded);
                info!(
                    stored_name = %result.stored_name,
                    bytes = result.byte_size,
                    "downloaded shared file"
                );
                Ok(result)
            }
            Err(error) => {
                artifact.discard().await;
                state.advance(TransferState::Failed);
                warn!(kind = %error.kind(), error = %error, "transfer failed");
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        file_id: &FileId,
        artifact: &mut TemporaryArtifact,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<TransferResult, TransferError> {
        let temp_path = artifact.path().to_path_buf();
        let outcome = self.fetcher.fetch(file_id, &temp_path, progress).await?;

        let byte_size = match tokio::fs::metadata(&temp_path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(TransferError::empty_artifact(file_id.as_str(), &temp_path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TransferError::empty_artifact(file_id.as_str(), &temp_path));
            }
            Err(e) => return Err(TransferError::io(&temp_path, e)),
        };

        // Zero bytes usually means the remote file is private.
        if byte_size == 0 {
            return Err(TransferError::empty_artifact(file_id.as_str(), &temp_path));
        }

        if let Some(expected) = outcome.content_length
            && expected != byte_size
        {
            warn!(expected, actual = byte_size, "stored size differs from announced length");
        }

        let original_name = canonical_file_name(file_id);
        let stored_name = artifact
            .promote(Arc::clone(&self.store), &original_name)
            .await
            .map_err(|e| TransferError::io(self.store.storage_dir().join(&original_name), e))?;
        let storage_path = self.store.storage_dir().join(&stored_name);

        Ok(TransferResult {
            stored_name,
            original_name,
            storage_path,
            content_type: STORED_CONTENT_TYPE.to_string(),
            byte_size,
        })
    }
}

//! Storage collaborator: temp-path allocation, unique naming, artifact lifecycle.
//!
//! The engine never touches the storage directory directly. It asks an
//! [`ArtifactStore`] for a temporary path and for a collision-free final name,
//! and owns the temporary file through a [`TemporaryArtifact`] guard until it
//! is either promoted or discarded.

use std::fs::OpenOptions;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{debug, warn};

use super::constants::{TEMP_NAME_PREFIX, TEMP_SUFFIX_LEN};

/// Directory plus naming policy the engine writes into.
///
/// Implementations must be safe to call from concurrent transfers: two
/// callers never receive the same name.
pub trait ArtifactStore: Send + Sync + std::fmt::Debug {
    /// Directory holding temporary and final artifacts.
    fn storage_dir(&self) -> &Path;

    /// Returns a fresh temporary path inside [`storage_dir`](Self::storage_dir).
    fn allocate_temp_path(&self) -> PathBuf;

    /// Reserves a filename that does not collide with existing entries.
    ///
    /// The name is claimed on disk before it is returned, so a concurrent
    /// caller asking for the same name gets the next free one.
    ///
    /// # Errors
    ///
    /// Returns the IO error that prevented the reservation.
    fn uniquify(&self, desired_name: &str) -> std::io::Result<String>;

    /// Moves `temp_path` into the storage directory under a reserved name.
    ///
    /// Blocking; run it off the async executor. The reservation is released
    /// again when the rename fails.
    ///
    /// # Errors
    ///
    /// Returns the reservation or rename error.
    fn commit(&self, temp_path: &Path, desired_name: &str) -> std::io::Result<String> {
        let name = self.uniquify(desired_name)?;
        let final_path = self.storage_dir().join(&name);
        if let Err(error) = std::fs::rename(temp_path, &final_path) {
            match std::fs::remove_file(&final_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %final_path.display(), error = %e, "failed to release reserved name");
                }
            }
            return Err(error);
        }
        debug!(from = %temp_path.display(), to = %final_path.display(), "committed artifact");
        Ok(name)
    }
}

/// Filesystem-backed store for downloaded videos.
#[derive(Debug, Clone)]
pub struct VideoStorage {
    dir: PathBuf,
}

impl VideoStorage {
    /// Creates a store rooted at `dir`. The directory is not created.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the storage directory (and parents) if missing.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the directory cannot be created.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }
}

impl ArtifactStore for VideoStorage {
    fn storage_dir(&self) -> &Path {
        &self.dir
    }

    fn allocate_temp_path(&self) -> PathBuf {
        self.dir.join(temp_file_name())
    }

    fn uniquify(&self, desired_name: &str) -> std::io::Result<String> {
        reserve_unique_file_name(&self.dir, desired_name, 1)
    }
}

/// `temp_<unix-millis>_<9 lowercase alphanumerics>`.
pub(crate) fn temp_file_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{TEMP_NAME_PREFIX}{millis}_{suffix}")
}

/// Claims a unique filename in `dir`, adding a numeric suffix if taken.
///
/// Each candidate is created with `create_new`, so the check and the claim
/// are one atomic step and concurrent callers cannot both win a name.
/// Example with `suffix_start = 1`: `file.mp4`, then `file_1.mp4`, `file_2.mp4`, ...
pub(crate) fn reserve_unique_file_name(
    dir: &Path,
    desired_name: &str,
    suffix_start: usize,
) -> std::io::Result<String> {
    let filename = {
        let sanitized = sanitize_filename(desired_name);
        if sanitized.trim_matches('_').is_empty() {
            "download.bin".to_string()
        } else {
            sanitized
        }
    };

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let candidates = std::iter::once(filename.clone())
        .chain((suffix_start..1000).map(|i| format!("{stem}_{i}{ext}")))
        .chain(std::iter::once(format!("{stem}_{timestamp}{ext}")));

    for candidate in candidates {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&candidate))
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free file name for '{filename}'"),
    ))
}

/// Replaces characters that are invalid on common filesystems.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Exclusive owner of one in-flight temporary file.
///
/// The file is removed when the guard is discarded or dropped without being
/// promoted, so an abandoned transfer never leaves an orphan behind.
#[derive(Debug)]
pub struct TemporaryArtifact {
    path: Option<PathBuf>,
}

impl TemporaryArtifact {
    /// Takes ownership of `path`. The file itself may not exist yet.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Path of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Hands the file to `store`, which moves it under a collision-free name.
    ///
    /// Returns the stored name. On failure the guard keeps ownership so the
    /// caller can discard it.
    ///
    /// # Errors
    ///
    /// Returns the reservation or rename error.
    pub async fn promote(
        &mut self,
        store: Arc<dyn ArtifactStore>,
        desired_name: &str,
    ) -> std::io::Result<String> {
        let Some(path) = self.path.clone() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "temporary artifact already released",
            ));
        };
        let desired_name = desired_name.to_string();
        let name = tokio::task::spawn_blocking(move || store.commit(&path, &desired_name))
            .await
            .map_err(std::io::Error::other)??;
        self.path = None;
        Ok(name)
    }

    /// Removes the temporary file, best-effort.
    ///
    /// A missing file is fine; other failures are logged, not returned.
    pub async fn discard(mut self) {
        if let Some(path) = self.path.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(path = %path.display(), "removed temporary artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove temporary artifact");
                }
            }
        }
    }
}

impl Drop for TemporaryArtifact {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed abandoned temporary artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove abandoned temporary artifact");
                }
            }
        }
    }
}

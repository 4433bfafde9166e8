//! Library-level transfer configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::download::constants::{
    BROWSER_USER_AGENT, CONNECT_TIMEOUT_SECS, DEFAULT_SERVICE_BASE_URL,
    DEFAULT_SUBPROCESS_PROGRAM, TRANSFER_TIMEOUT_SECS,
};
use crate::download::{
    BuildError, FetchStrategy, Fetcher, HttpFetcher, HttpFetcherOptions, SubprocessFetcher,
    TransferEngine, VideoStorage,
};

/// Default storage directory for downloaded videos, relative to the working directory.
pub const DEFAULT_STORAGE_DIR: &str = "videos";

/// Everything needed to assemble a [`TransferEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Directory receiving temporary and final artifacts.
    pub storage_dir: PathBuf,
    /// Which strategy moves the bytes.
    pub strategy: FetchStrategy,
    /// Overall transfer timeout.
    pub timeout: Duration,
    /// Connection timeout (direct strategy).
    pub connect_timeout: Duration,
    /// User-Agent header (direct strategy).
    pub user_agent: String,
    /// Service base URL.
    pub base_url: String,
    /// External program (subprocess strategy).
    pub subprocess_program: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            strategy: FetchStrategy::default(),
            timeout: Duration::from_secs(TRANSFER_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            user_agent: BROWSER_USER_AGENT.to_string(),
            base_url: DEFAULT_SERVICE_BASE_URL.to_string(),
            subprocess_program: DEFAULT_SUBPROCESS_PROGRAM.to_string(),
        }
    }
}

impl TransferConfig {
    /// Builds the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the direct strategy cannot be constructed.
    pub fn build_fetcher(&self) -> Result<Box<dyn Fetcher>, BuildError> {
        let fetcher: Box<dyn Fetcher> = match self.strategy {
            FetchStrategy::Direct => Box::new(HttpFetcher::with_options(HttpFetcherOptions {
                base_url: self.base_url.clone(),
                connect_timeout: self.connect_timeout,
                timeout: self.timeout,
                user_agent: self.user_agent.clone(),
            })?),
            FetchStrategy::Subprocess => Box::new(
                SubprocessFetcher::new(self.subprocess_program.clone())
                    .with_base_url(self.base_url.clone())
                    .with_timeout(self.timeout),
            ),
        };
        Ok(fetcher)
    }

    /// Builds an engine writing into [`storage_dir`](Self::storage_dir).
    ///
    /// The directory itself is not created; see [`VideoStorage::ensure_dir`].
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the strategy cannot be constructed.
    pub fn build_engine(&self) -> Result<TransferEngine, BuildError> {
        debug!(
            strategy = %self.strategy,
            storage_dir = %self.storage_dir.display(),
            timeout_secs = self.timeout.as_secs(),
            "building transfer engine"
        );
        let fetcher = self.build_fetcher()?;
        Ok(TransferEngine::new(
            fetcher,
            Arc::new(VideoStorage::new(self.storage_dir.clone())),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.storage_dir, PathBuf::from("videos"));
        assert_eq!(config.strategy, FetchStrategy::Direct);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.subprocess_program, "gdown");
    }

    #[test]
    fn test_build_engine_direct() {
        let engine = TransferConfig::default().build_engine().unwrap();
        assert_eq!(engine.strategy_name(), "direct");
        assert_eq!(engine.store().storage_dir(), Path::new("videos"));
    }

    #[test]
    fn test_build_engine_subprocess() {
        let config = TransferConfig {
            strategy: FetchStrategy::Subprocess,
            storage_dir: PathBuf::from("/srv/media"),
            ..TransferConfig::default()
        };
        let engine = config.build_engine().unwrap();
        assert_eq!(engine.strategy_name(), "subprocess");
        assert_eq!(engine.store().storage_dir(), Path::new("/srv/media"));
    }

    #[test]
    fn test_build_engine_rejects_bad_base_url() {
        let config = TransferConfig {
            base_url: "not a url".to_string(),
            ..TransferConfig::default()
        };
        assert!(config.build_engine().is_err());
    }
}

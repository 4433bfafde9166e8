//! Direct strategy: streamed HTTP GET against the export endpoint.
//!
//! This module provides [`HttpFetcher`], which requests
//! `<base>/uc?export=download&id=<id>` and streams the body to the temporary
//! path, deriving progress from the `Content-Length` header.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, USER_AGENT};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    BROWSER_USER_AGENT, CONNECT_TIMEOUT_SECS, DEFAULT_SERVICE_BASE_URL, TRANSFER_TIMEOUT_SECS,
};
use super::error::{BuildError, TransferError};
use super::fetcher::{FetchOutcome, Fetcher};
use super::progress::ProgressTracker;
use crate::parser::FileId;

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherOptions {
    /// Base URL of the service; the export path is appended to it.
    pub base_url: String,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Overall timeout covering the request and the whole body.
    pub timeout: Duration,
    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpFetcherOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SERVICE_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            timeout: Duration::from_secs(TRANSFER_TIMEOUT_SECS),
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

/// HTTP fetcher for the service's export-download endpoint.
///
/// Create once and reuse; the inner client pools connections across
/// transfers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    timeout: Duration,
    user_agent: String,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Creates a fetcher with default endpoint and timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_options(HttpFetcherOptions::default())
            .expect("failed to build HTTP fetcher with static configuration")
    }

    /// Creates a fetcher from explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] when the base URL is not an absolute http(s)
    /// URL or the HTTP client cannot be built.
    #[instrument(level = "debug", skip(options), fields(base_url = %options.base_url))]
    pub fn with_options(options: HttpFetcherOptions) -> Result<Self, BuildError> {
        let base_url = parse_base_url(&options.base_url)?;
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .timeout(options.timeout)
            .gzip(true)
            .build()
            .map_err(BuildError::HttpClient)?;
        Ok(Self {
            client,
            base_url,
            timeout: options.timeout,
            user_agent: options.user_agent,
        })
    }

    /// Export-download URL for `file_id`.
    #[must_use]
    pub fn export_url(&self, file_id: &FileId) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("uc");
        }
        url.query_pairs_mut()
            .append_pair("export", "download")
            .append_pair("id", file_id.as_str());
        url
    }

    /// Overall transfer timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "direct"
    }

    #[instrument(skip(self, temp_path, progress), fields(strategy = "direct", file_id = %file_id))]
    async fn fetch(
        &self,
        file_id: &FileId,
        temp_path: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<FetchOutcome, TransferError> {
        let url = self.export_url(file_id);
        debug!(url = %url, "requesting export download");

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| TransferError::from_reqwest(file_id.as_str(), url.as_str(), self.timeout, e))?;

        let status = response.status();
        if status.as_u16() != 200 {
            debug!(status = status.as_u16(), "export endpoint returned error status");
            return Err(TransferError::from_status(
                file_id.as_str(),
                url.as_str(),
                status.as_u16(),
            ));
        }

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let mut file = File::create(temp_path)
            .await
            .map_err(|e| TransferError::io(temp_path, e))?;

        let bytes_written = stream_to_file(
            &mut file,
            response,
            StreamContext {
                file_id,
                url: url.as_str(),
                timeout: self.timeout,
                temp_path,
                content_length,
            },
            progress,
        )
        .await?;

        info!(bytes = bytes_written, content_length = ?content_length, "export stream complete");
        Ok(FetchOutcome {
            bytes_written: Some(bytes_written),
            content_length,
        })
    }
}

struct StreamContext<'a> {
    file_id: &'a FileId,
    url: &'a str,
    timeout: Duration,
    temp_path: &'a Path,
    content_length: Option<u64>,
}

/// Streams the response body to `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    ctx: StreamContext<'_>,
    progress: &mut ProgressTracker<'_>,
) -> Result<u64, TransferError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            TransferError::from_reqwest(ctx.file_id.as_str(), ctx.url, ctx.timeout, e)
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| TransferError::io(ctx.temp_path, e))?;

        bytes_written += chunk.len() as u64;
        progress.observe_bytes(bytes_written, ctx.content_length);
    }

    writer
        .flush()
        .await
        .map_err(|e| TransferError::io(ctx.temp_path, e))?;

    Ok(bytes_written)
}

fn parse_base_url(raw: &str) -> Result<Url, BuildError> {
    let parsed = Url::parse(raw).map_err(|e| BuildError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" if !parsed.cannot_be_a_base() => Ok(parsed),
        scheme => Err(BuildError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: format!("scheme '{scheme}' is not supported"),
        }),
    }
}

//! Constants for the download module (endpoints, timeouts, naming).

/// Default base URL of the file-sharing service.
pub const DEFAULT_SERVICE_BASE_URL: &str = "https://drive.google.com";

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default overall transfer timeout (5 minutes for large files).
pub const TRANSFER_TIMEOUT_SECS: u64 = 300;

/// Browser User-Agent sent with export requests.
///
/// The export endpoint gates some responses on the client fingerprint.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default external download program for the subprocess strategy.
pub const DEFAULT_SUBPROCESS_PROGRAM: &str = "gdown";

/// Prefix for canonical stored filenames (`gdrive_<id>.mp4`).
pub const STORED_NAME_PREFIX: &str = "gdrive_";

/// Fixed extension of stored artifacts.
pub const STORED_EXTENSION: &str = "mp4";

/// Content type reported for every stored artifact.
pub const STORED_CONTENT_TYPE: &str = "video/mp4";

/// Display name carried by progress events.
pub const PROGRESS_DISPLAY_NAME: &str = "Google Drive File";

/// Prefix for temporary artifact filenames.
pub const TEMP_NAME_PREFIX: &str = "temp_";

/// Length of the random suffix in temporary filenames.
pub const TEMP_SUFFIX_LEN: usize = 9;

//! File identifier extraction from share links.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use super::error::ParseError;

/// Minimum length accepted for a bare identifier token.
pub const MIN_BARE_ID_LEN: usize = 25;

/// Share-link shapes, in resolution order. First match wins.
#[allow(clippy::expect_used)]
static LINK_PATTERNS: LazyLock<[(&'static str, Regex); 3]> = LazyLock::new(|| {
    [
        (
            "file_path",
            Regex::new(r"/file/d/([^/?&#]+)").expect("file path regex is valid"),
        ),
        (
            "query",
            Regex::new(r"\?id=([^&#]+)").expect("query regex is valid"),
        ),
        (
            "short_path",
            Regex::new(r"/d/([^/?&#]+)").expect("short path regex is valid"),
        ),
    ]
});

#[allow(clippy::expect_used)]
static BARE_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[A-Za-z0-9_-]{{{MIN_BARE_ID_LEN},}}$")).expect("bare id regex is valid")
});

#[allow(clippy::expect_used)]
static ID_ALPHABET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("id alphabet regex is valid"));

/// Opaque token naming a file within the remote service.
///
/// Always non-empty and restricted to URL-safe alphanumerics plus `-` and `_`,
/// so it can be embedded in URLs and filenames without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Wraps a token after checking the identifier alphabet.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidReferenceFormat`] when the token is empty
    /// or contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(token: impl Into<String>) -> Result<Self, ParseError> {
        let token = token.into();
        if ID_ALPHABET.is_match(&token) {
            Ok(Self(token))
        } else {
            Err(ParseError::invalid_reference(&token))
        }
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extracts the file identifier from a share link or bare identifier.
///
/// Recognized shapes, tried in this order:
/// 1. `…/file/d/<id>/…`
/// 2. `…?id=<id>&…`
/// 3. `…/d/<id>/…`
/// 4. the trimmed input itself, if it is at least 25 characters of `[A-Za-z0-9_-]`
///
/// No network access is performed; whether the file exists is only known at
/// transfer time.
///
/// # Errors
///
/// Returns [`ParseError::InvalidReferenceFormat`] when no shape matches.
///
/// # Examples
///
/// ```
/// use drivefetch_core::parser::extract_file_id;
///
/// let id = extract_file_id("https://drive.google.com/file/d/1AbCdEfGhIjKlMnOpQrStUvWxYz1234567/view").unwrap();
/// assert_eq!(id.as_str(), "1AbCdEfGhIjKlMnOpQrStUvWxYz1234567");
/// ```
#[tracing::instrument(skip(reference), fields(input_len = reference.len()))]
pub fn extract_file_id(reference: &str) -> Result<FileId, ParseError> {
    let trimmed = reference.trim();

    for (shape, pattern) in LINK_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(trimmed) {
            trace!(shape, "share link shape matched");
            let id = FileId::new(&captures[1]).map_err(|_| ParseError::invalid_reference(trimmed))?;
            debug!(shape, file_id = %id, "extracted file identifier");
            return Ok(id);
        }
    }

    if BARE_ID_PATTERN.is_match(trimmed) {
        debug!(file_id = trimmed, "accepted bare identifier");
        return Ok(FileId(trimmed.to_string()));
    }

    debug!("no share link shape matched");
    Err(ParseError::invalid_reference(trimmed))
}

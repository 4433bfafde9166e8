//! Error types for share-reference parsing.

use thiserror::Error;

use crate::failure::ErrorKind;

/// Errors that can occur while extracting a file identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input matched none of the recognized share-link shapes.
    #[error(
        "invalid share reference '{reference}': expected a share link or a file identifier\n  Suggestion: {suggestion}"
    )]
    InvalidReferenceFormat {
        /// The trimmed input that failed to parse.
        reference: String,
        /// How to fix the issue.
        suggestion: &'static str,
    },
}

impl ParseError {
    /// Creates an `InvalidReferenceFormat` error for the given input.
    #[must_use]
    pub fn invalid_reference(reference: &str) -> Self {
        Self::InvalidReferenceFormat {
            reference: reference.chars().take(200).collect(),
            suggestion: ErrorKind::InvalidReferenceFormat.describe().fix,
        }
    }

    /// Failure category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReferenceFormat { .. } => ErrorKind::InvalidReferenceFormat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_reference_message_contains_input() {
        let err = ParseError::invalid_reference("not a link");
        let msg = err.to_string();
        assert!(msg.contains("not a link"), "should contain input: {msg}");
        assert!(msg.contains("Suggestion:"), "should have suggestion: {msg}");
    }

    #[test]
    fn test_invalid_reference_truncates_long_input() {
        let long = "x".repeat(5000);
        let ParseError::InvalidReferenceFormat { reference, .. } =
            ParseError::invalid_reference(&long);
        assert_eq!(reference.len(), 200);
    }

    #[test]
    fn test_kind_is_invalid_reference_format() {
        assert_eq!(
            ParseError::invalid_reference("?").kind(),
            ErrorKind::InvalidReferenceFormat
        );
    }
}

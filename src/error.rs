//! Error types for the version subsystem.
//!
//! All fallible operations return [`VersionError`] through the crate-wide
//! [`Result`] alias. Only structural problems surface as errors: a document
//! that cannot be parsed, a locator that cannot be decoded, or a storage
//! failure. Invariant violations found in otherwise readable documents are
//! logged and repaired in place so that old data keeps loading.
//!
//! # Examples
//!
//! ```
//! use index_version::error::{Result, VersionError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(VersionError::invalid_argument("version id must not be negative"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

use crate::version::VersionId;

/// The main error type for version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors outside of document decoding.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A persisted version document could not be decoded.
    ///
    /// The raw content is kept so that the corrupt file can be diagnosed
    /// without re-reading it from storage.
    #[error("Failed to decode version {}: {reason}", display_version_id(.version_id))]
    Decode {
        /// Version id of the document, when it could be recovered.
        version_id: Option<VersionId>,
        /// What was wrong with the document.
        reason: String,
        /// The raw document text.
        content: String,
    },

    /// Locator encoding or decoding errors.
    #[error("Locator error: {0}")]
    Locator(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

fn display_version_id(version_id: &Option<VersionId>) -> String {
    match version_id {
        Some(id) => id.to_string(),
        None => "<unknown>".to_string(),
    }
}

/// Result type alias for operations that may fail with VersionError.
pub type Result<T> = std::result::Result<T, VersionError>;

impl VersionError {
    /// Create a new decode error.
    pub fn decode<S: Into<String>, C: Into<String>>(
        version_id: Option<VersionId>,
        reason: S,
        content: C,
    ) -> Self {
        VersionError::Decode {
            version_id,
            reason: reason.into(),
            content: content.into(),
        }
    }

    /// Create a new locator error.
    pub fn locator<S: Into<String>>(msg: S) -> Self {
        VersionError::Locator(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        VersionError::Storage(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        VersionError::InvalidArgument(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        VersionError::InvalidOperation(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        VersionError::NotFound(msg.into())
    }

    /// Whether this error means a persisted document is corrupt.
    pub fn is_corruption(&self) -> bool {
        matches!(self, VersionError::Decode { .. } | VersionError::Locator(_))
    }

    /// The raw document content attached to a decode error.
    pub fn content(&self) -> Option<&str> {
        match self {
            VersionError::Decode { content, .. } => Some(content),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = VersionError::storage("disk full");
        assert_eq!(error.to_string(), "Storage error: disk full");

        let error = VersionError::invalid_argument("bad id");
        assert_eq!(error.to_string(), "Invalid argument: bad id");

        let error = VersionError::not_found("version.3");
        assert_eq!(error.to_string(), "Not found: version.3");
    }

    #[test]
    fn test_decode_error_display() {
        let error = VersionError::decode(Some(7), "missing field `versionid`", "{}");
        assert_eq!(
            error.to_string(),
            "Failed to decode version 7: missing field `versionid`"
        );
        assert_eq!(error.content(), Some("{}"));
        assert!(error.is_corruption());

        let error = VersionError::decode(None, "truncated", "{\"versionid\":");
        assert!(error.to_string().contains("<unknown>"));
    }

    #[test]
    fn test_error_from_io() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error = VersionError::from(io_error);

        match error {
            VersionError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }
        assert!(!VersionError::storage("x").is_corruption());
    }
}

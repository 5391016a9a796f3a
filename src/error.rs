//! Error types for the Glaive library.
//!
//! Every fallible operation returns [`Result`], whose error type is the
//! [`GlaiveError`] enum. The variants follow the error taxonomy of the engine:
//!
//! - [`GlaiveError::LockContention`] - another writer already owns the index
//! - [`GlaiveError::CorruptSegment`] - a segment failed validation on open
//! - [`GlaiveError::Analysis`] - a text analysis stage failed
//! - [`GlaiveError::QuerySyntax`] - a query was rejected before execution
//! - [`GlaiveError::Io`] - durable storage could not be accessed
//!
//! # Examples
//!
//! ```
//! use glaive::error::{GlaiveError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(GlaiveError::query_syntax("unbalanced parenthesis"))
//! }
//!
//! match example_operation() {
//!     Err(GlaiveError::QuerySyntax(msg)) => assert_eq!(msg, "unbalanced parenthesis"),
//!     _ => unreachable!(),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Glaive operations.
#[derive(Error, Debug)]
pub enum GlaiveError {
    /// I/O errors raised by the durable storage.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another writer holds the write lock of the index.
    #[error("Lock contention: {0}")]
    LockContention(String),

    /// A segment file failed checksum or structure validation.
    #[error("Corrupt segment {segment}: {reason}")]
    CorruptSegment {
        /// Name of the offending segment (or file).
        segment: String,
        /// What went wrong.
        reason: String,
    },

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A query was malformed and rejected before execution.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// Index-related errors.
    #[error("Index error: {0}")]
    Index(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Binary serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with [`GlaiveError`].
pub type Result<T> = std::result::Result<T, GlaiveError>;

impl GlaiveError {
    /// Create a new lock contention error.
    pub fn lock_contention<S: Into<String>>(msg: S) -> Self {
        GlaiveError::LockContention(msg.into())
    }

    /// Create a new corrupt segment error.
    pub fn corrupt<S: Into<String>, R: Into<String>>(segment: S, reason: R) -> Self {
        GlaiveError::CorruptSegment {
            segment: segment.into(),
            reason: reason.into(),
        }
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        GlaiveError::Analysis(msg.into())
    }

    /// Create a new query syntax error.
    pub fn query_syntax<S: Into<String>>(msg: S) -> Self {
        GlaiveError::QuerySyntax(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        GlaiveError::Index(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        GlaiveError::Storage(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GlaiveError::Config(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        GlaiveError::Serialization(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        GlaiveError::Other(msg.into())
    }

    /// Whether this error is a write lock contention.
    pub fn is_lock_contention(&self) -> bool {
        matches!(self, GlaiveError::LockContention(_))
    }

    /// Whether this error reports a corrupt segment.
    pub fn is_corrupt_segment(&self) -> bool {
        matches!(self, GlaiveError::CorruptSegment { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = GlaiveError::index("Test index error");
        assert_eq!(error.to_string(), "Index error: Test index error");

        let error = GlaiveError::query_syntax("unexpected ')'");
        assert_eq!(error.to_string(), "Query syntax error: unexpected ')'");

        let error = GlaiveError::corrupt("segment_000001", "checksum mismatch");
        assert_eq!(
            error.to_string(),
            "Corrupt segment segment_000001: checksum mismatch"
        );
        assert!(error.is_corrupt_segment());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let glaive_error = GlaiveError::from(io_error);

        match glaive_error {
            GlaiveError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_lock_contention_predicate() {
        assert!(GlaiveError::lock_contention("write.lock").is_lock_contention());
        assert!(!GlaiveError::other("x").is_lock_contention());
    }
}

//! Error types for certdup.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for certdup operations.
pub type Result<T> = std::result::Result<T, DedupError>;

/// Errors that abort a deduplication run.
///
/// Every variant is fatal. Temporary files written before the failure are
/// left in place for inspection.
#[derive(Error, Debug)]
pub enum DedupError {
    /// The input file does not exist (checked before scanning).
    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// The fingerprint could not be extracted from a line.
    #[error("Malformed record at byte offset {offset}: {reason}")]
    MalformedRecord {
        offset: u64,
        #[source]
        reason: ExtractError,
    },

    /// A line is too long to be addressed by a `SourceLocation`.
    #[error("Record at byte offset {offset} exceeds the {limit}-byte record limit")]
    RecordTooLarge { offset: u64, limit: u64 },

    /// Read, write, or seek failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while reading back or summarizing output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reasons a fingerprint could not be pulled out of a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("not valid JSON: {0}")]
    InvalidJson(String),

    #[error("field '{path}' not found")]
    MissingField { path: &'static str },

    /// A value on the path has the wrong type, e.g. a numeric fingerprint.
    #[error("unexpected value type: {0}")]
    WrongType(String),
}

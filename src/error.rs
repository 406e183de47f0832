//! Error types for constdb.

use std::io;
use thiserror::Error;

/// The result type used throughout constdb.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for constdb operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing medium failed (short read, short write, seek failure).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The database would outgrow the 32-bit offset space.
    #[error("Too much data: projected size {projected} exceeds limit {limit}")]
    TooMuchData {
        /// The file size the rejected operation would have produced.
        projected: u64,
        /// The largest file size the format can address.
        limit: u64,
    },

    /// The file is structurally invalid.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// The checksum trailer does not match the file contents.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The digest stored in the trailer, hex encoded.
        expected: String,
        /// The digest computed over the file, hex encoded.
        actual: String,
    },

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The writer cannot accept the operation in its current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Returns true if the error means the file cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::ChecksumMismatch { .. })
    }
}

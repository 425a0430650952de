//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The persisted data is structurally invalid.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A record checksum did not match its contents.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged record.
        offset: u64,
        /// Checksum stored alongside the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// The engine is closed (or was destroyed underneath a reader).
    #[error("storage is closed")]
    Closed,

    /// Another owner holds the engine directory.
    #[error("storage directory is locked: {0}")]
    Locked(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}

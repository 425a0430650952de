//! Error types for windb core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in windowed store operations.
///
/// Retention-boundary conditions are never errors: writes outside the
/// window are dropped and fetches outside it return nothing. Only genuine
/// storage faults and contract violations surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage engine error.
    #[error("storage error: {0}")]
    Storage(#[from] windb_storage::StorageError),

    /// Key or value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] windb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A binary key is too short to carry a timestamp and sequence number.
    #[error("malformed binary key: {len} bytes")]
    MalformedKey {
        /// Length of the offending key.
        len: usize,
    },

    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },

    /// The store has not been initialized, or has been closed.
    #[error("store {name} is not open")]
    StoreNotOpen {
        /// Name of the store.
        name: String,
    },

    /// A segment id cannot be represented as a calendar time.
    #[error("segment {id} is outside the representable time range")]
    SegmentName {
        /// The segment id.
        id: i64,
    },

    /// The change log could not be replayed.
    #[error("change log corruption: {message}")]
    ChangeLogCorruption {
        /// Description of the corruption.
        message: String,
    },
}

impl CoreError {
    /// Creates a malformed key error.
    pub fn malformed_key(len: usize) -> Self {
        Self::MalformedKey { len }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a store-not-open error.
    pub fn store_not_open(name: impl Into<String>) -> Self {
        Self::StoreNotOpen { name: name.into() }
    }

    /// Creates a change log corruption error.
    pub fn change_log_corruption(message: impl Into<String>) -> Self {
        Self::ChangeLogCorruption {
            message: message.into(),
        }
    }
}

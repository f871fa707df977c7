//! Error types for storage backends.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The log directory could not be created.
    #[error("Storage error: failed to create audit log directory '{}': {source}", path.display())]
    CreateDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Opening, writing or flushing a log file failed.
    #[error("Storage error: failed to store event to file '{}': {source}", path.display())]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file backend was configured with a format it cannot write.
    #[error("Storage error: unsupported format: {format}")]
    UnsupportedFormat {
        /// The format name as configured.
        format: String,
    },

    /// The database URL names a scheme other than `sqlite`.
    #[error("Storage error: unsupported database URL '{url}' (expected sqlite:// or a file path)")]
    UnsupportedUrl {
        /// The URL as configured.
        url: String,
    },

    /// The database rejected a statement.
    #[error("Storage error: database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An event could not be serialized.
    #[error("Storage error: failed to serialize event: {0}")]
    Event(#[from] mnemosyne_core::Error),

    /// A stored event body is not valid JSON.
    #[error("Storage error: corrupt event data: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

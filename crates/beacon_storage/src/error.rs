//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The path does not exist.
    #[error("no such file or directory: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// A directory operation was attempted on something that is not a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A file operation was attempted on a directory, or a directory
    /// could not be created because a file is in the way.
    #[error("path already exists with a different kind: {}", path.display())]
    AlreadyExists {
        /// The offending path.
        path: PathBuf,
    },

    /// The medium refuses writes.
    #[error("storage medium is write protected")]
    WriteProtected,
}

impl StorageError {
    /// Creates a [`StorageError::NotFound`] for `path`.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Creates a [`StorageError::NotADirectory`] for `path`.
    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Self::NotADirectory { path: path.into() }
    }
}

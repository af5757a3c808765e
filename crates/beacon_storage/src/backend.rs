//! Filesystem collaborator trait definitions.

use crate::error::StorageResult;
use std::path::{Path, PathBuf};

/// One entry returned by [`LogFs::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Full path of the entry.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Length in bytes (0 for directories).
    pub len: u64,
}

/// A filesystem holding the recorder's log files.
///
/// Filesystems are **opaque byte sinks**. The recorder only needs existence
/// checks, directory creation and listing, append-only files and removal.
/// Every failure is reported as a [`crate::StorageError`]; callers decide
/// whether it makes the medium unusable.
///
/// # Invariants
///
/// - `create_dir` is idempotent and creates missing parents
/// - `open_append` creates the file if it is missing and never truncates
/// - bytes written through a [`LogFile`] land after all previously written bytes
/// - implementations must be `Send + Sync` so several execution contexts
///   can reach the same medium
///
/// # Implementors
///
/// - [`super::InMemoryFs`] - For testing
/// - [`super::StdFs`] - For persistent storage
pub trait LogFs: Send + Sync {
    /// Handle returned by [`LogFs::open_append`].
    type File: LogFile;

    /// Returns true if anything exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Returns true if `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Creates `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a file is in the way or the medium fails.
    fn create_dir(&self, path: &Path) -> StorageResult<()>;

    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory is missing, `path` is a
    /// directory, or the medium refuses writes.
    fn open_append(&self, path: &Path) -> StorageResult<Self::File>;

    /// Lists the direct children of the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotADirectory`] when `path` is a file
    /// and [`crate::StorageError::NotFound`] when it is missing.
    fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>>;

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be removed.
    fn remove(&self, path: &Path) -> StorageResult<()>;
}

/// An open, append-only log file.
pub trait LogFile {
    /// Appends all of `data` to the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. Part of `data` may have been
    /// written when this happens.
    fn write_all(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Closes the file, pushing buffered bytes to the medium.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    fn close(self) -> StorageResult<()>;
}

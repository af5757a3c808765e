//! Log folder management.
//!
//! This module handles the layout of the log folder on the medium:
//!
//! ```text
//! <folder>/
//! ├─ 0.log        # earlier session
//! ├─ 1.log        # earlier session
//! └─ 2.log        # current session (first unused index)
//! ```
//!
//! File names come from a [`FileNameTemplate`]; a new session takes the
//! lowest index whose file does not exist yet. Files left empty by a crash
//! are removed before the next session picks its name.

use crate::config::FileNameTemplate;
use crate::error::{RecorderError, RecorderResult};
use beacon_storage::{LogFs, StorageError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Extension of files eligible for pruning.
pub const LOG_EXTENSION: &str = "log";

/// The file currently receiving flushed slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    path: PathBuf,
    index: u32,
    bytes_written: u64,
}

impl Session {
    pub(crate) fn new(path: PathBuf, index: u32) -> Self {
        Self {
            path,
            index,
            bytes_written: 0,
        }
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the index substituted into the file name.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the bytes written to this file by the recorder.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn add_written(&mut self, bytes: usize) {
        self.bytes_written += bytes as u64;
    }
}

/// Outcome of [`prune_empty_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Files that were deleted.
    pub removed: Vec<PathBuf>,
    /// Files that were left in place.
    pub kept: usize,
}

/// Creates `folder` if it does not exist yet.
///
/// # Errors
///
/// Returns an error if `folder` exists but is not a directory, or if it
/// cannot be created.
pub fn ensure_directory<F: LogFs>(fs: &F, folder: &Path) -> RecorderResult<()> {
    if !fs.exists(folder) {
        fs.create_dir(folder)?;
        debug!(folder = %folder.display(), "created log folder");
    } else if !fs.is_dir(folder) {
        return Err(StorageError::not_a_directory(folder).into());
    }
    Ok(())
}

/// Deletes zero-length `.log` files in `folder`.
///
/// Directories and files with content or another extension are left alone.
///
/// # Errors
///
/// Returns an error, without deleting anything, if `folder` is not a
/// directory. Returns an error if a removal fails.
pub fn prune_empty_files<F: LogFs>(fs: &F, folder: &Path) -> RecorderResult<PruneReport> {
    let entries = fs.read_dir(folder).map_err(|e| {
        error!(folder = %folder.display(), error = %e, "cannot scan log folder");
        RecorderError::from(e)
    })?;

    let mut report = PruneReport::default();
    for entry in entries {
        if entry.is_dir {
            continue;
        }
        let is_log = entry.path.extension() == Some(OsStr::new(LOG_EXTENSION));
        if is_log && entry.len == 0 {
            fs.remove(&entry.path)?;
            info!(path = %entry.path.display(), "removed empty log file");
            report.removed.push(entry.path);
        } else {
            debug!(path = %entry.path.display(), bytes = entry.len, "found existing file");
            report.kept += 1;
        }
    }
    Ok(report)
}

/// Finds the first index in `start..limit` whose file does not exist.
///
/// Nothing is created on the medium.
///
/// # Errors
///
/// Returns [`RecorderError::NameSpaceExhausted`] if every candidate exists.
pub fn next_free_path<F: LogFs>(
    fs: &F,
    folder: &Path,
    template: &FileNameTemplate,
    start: u32,
    limit: u32,
) -> RecorderResult<(u32, PathBuf)> {
    for index in start..limit {
        let path = folder.join(template.render(index));
        if !fs.exists(&path) {
            return Ok((index, path));
        }
    }

    error!(folder = %folder.display(), limit, "max files per folder exceeded");
    Err(RecorderError::NameSpaceExhausted {
        folder: folder.to_path_buf(),
        limit,
    })
}

//! OS filesystem for persistent storage.

use crate::backend::{DirEntry, LogFile, LogFs};
use crate::error::{StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// The host operating system's filesystem.
///
/// On a device this is typically a FAT volume on a removable card mounted
/// by the platform; on a host it is any directory.
///
/// # Durability
///
/// - Files are opened in append mode, so every write lands at the end
/// - [`LogFile::close`] flushes and calls `File::sync_data()` so the bytes
///   are on the medium before the handle is released
///
/// # Example
///
/// ```no_run
/// use beacon_storage::{LogFile, LogFs, StdFs};
/// use std::path::Path;
///
/// let fs = StdFs::new();
/// fs.create_dir(Path::new("logs")).unwrap();
/// let mut file = fs.open_append(Path::new("logs/0.log")).unwrap();
/// file.write_all(b"persistent data\n").unwrap();
/// file.close().unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl StdFs {
    /// Creates a handle to the OS filesystem.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn map_not_found(err: io::Error, path: &Path) -> StorageError {
    if err.kind() == io::ErrorKind::NotFound {
        StorageError::not_found(path)
    } else {
        StorageError::Io(err)
    }
}

impl LogFs for StdFs {
    type File = StdFile;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir(&self, path: &Path) -> StorageResult<()> {
        if path.exists() && !path.is_dir() {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn open_append(&self, path: &Path) -> StorageResult<StdFile> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| map_not_found(e, path))?;

        Ok(StdFile {
            path: path.to_path_buf(),
            file,
        })
    }

    fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let metadata = fs::metadata(path).map_err(|e| map_not_found(e, path))?;
        if !metadata.is_dir() {
            return Err(StorageError::not_a_directory(path));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(DirEntry {
                path: entry.path(),
                is_dir: metadata.is_dir(),
                len: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        fs::remove_file(path).map_err(|e| map_not_found(e, path))
    }
}

/// An open file on the OS filesystem.
#[derive(Debug)]
pub struct StdFile {
    path: PathBuf,
    file: File,
}

impl StdFile {
    /// Returns the path the file was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogFile for StdFile {
    fn write_all(&mut self, data: &[u8]) -> StorageResult<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn close(mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

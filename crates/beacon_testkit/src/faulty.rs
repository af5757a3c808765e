//! Fault injection for the storage collaborator.
//!
//! [`FaultyFs`] wraps any [`LogFs`] and fails selected operations on
//! demand, the way a removable card fails when it is pulled or
//! write-protected mid-session.
//!
//! ## Usage
//!
//! ```rust
//! use beacon_storage::{InMemoryFs, LogFile, LogFs};
//! use beacon_testkit::FaultyFs;
//! use std::path::Path;
//!
//! let fs = FaultyFs::new(InMemoryFs::new());
//! fs.fail_after(4);
//!
//! let mut file = fs.open_append(Path::new("/0.log")).unwrap();
//! assert!(file.write_all(b"abcdefgh").is_err());
//! assert_eq!(fs.inner().data("/0.log").unwrap(), b"abcd");
//! ```

use beacon_storage::{DirEntry, LogFile, LogFs, StorageError, StorageResult};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Faults {
    fail_open: AtomicBool,
    fail_create_dir: AtomicBool,
    fail_close: AtomicBool,
    fail_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    faults_injected: AtomicUsize,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            fail_open: AtomicBool::new(false),
            fail_create_dir: AtomicBool::new(false),
            fail_close: AtomicBool::new(false),
            fail_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            faults_injected: AtomicUsize::new(0),
        }
    }
}

impl Faults {
    fn inject(&self, what: &str) -> StorageError {
        self.faults_injected.fetch_add(1, Ordering::SeqCst);
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated fault during {what}"),
        ))
    }
}

/// A filesystem wrapper that fails operations on demand.
///
/// Clones share the same fault settings.
#[derive(Debug, Clone)]
pub struct FaultyFs<F> {
    inner: F,
    faults: Arc<Faults>,
}

impl<F: LogFs> FaultyFs<F> {
    /// Wraps `inner` with every fault disabled.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Returns the wrapped filesystem.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Sets whether opening a file fails.
    pub fn set_fail_open(&self, fail: bool) {
        self.faults.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Sets whether creating a directory fails.
    pub fn set_fail_create_dir(&self, fail: bool) {
        self.faults.fail_create_dir.store(fail, Ordering::SeqCst);
    }

    /// Sets whether closing a file fails.
    pub fn set_fail_close(&self, fail: bool) {
        self.faults.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Fails writes once `bytes` have been written through this wrapper.
    ///
    /// The write that crosses the threshold stores its leading part and
    /// then fails.
    pub fn fail_after(&self, bytes: usize) {
        self.faults.bytes_written.store(0, Ordering::SeqCst);
        self.faults.fail_after_bytes.store(bytes, Ordering::SeqCst);
    }

    /// Disables every fault and resets the byte counter.
    pub fn reset(&self) {
        self.set_fail_open(false);
        self.set_fail_create_dir(false);
        self.set_fail_close(false);
        self.faults.fail_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.faults.bytes_written.store(0, Ordering::SeqCst);
    }

    /// Returns the number of operations that failed on purpose.
    pub fn faults_injected(&self) -> usize {
        self.faults.faults_injected.load(Ordering::SeqCst)
    }
}

impl<F: LogFs> LogFs for FaultyFs<F> {
    type File = FaultyFile<F::File>;

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn create_dir(&self, path: &Path) -> StorageResult<()> {
        if self.faults.fail_create_dir.load(Ordering::SeqCst) {
            return Err(self.faults.inject("create_dir"));
        }
        self.inner.create_dir(path)
    }

    fn open_append(&self, path: &Path) -> StorageResult<Self::File> {
        if self.faults.fail_open.load(Ordering::SeqCst) {
            return Err(self.faults.inject("open"));
        }
        Ok(FaultyFile {
            inner: self.inner.open_append(path)?,
            faults: Arc::clone(&self.faults),
        })
    }

    fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        self.inner.read_dir(path)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        self.inner.remove(path)
    }
}

/// A file handle opened through [`FaultyFs`].
#[derive(Debug)]
pub struct FaultyFile<T> {
    inner: T,
    faults: Arc<Faults>,
}

impl<T: LogFile> LogFile for FaultyFile<T> {
    fn write_all(&mut self, data: &[u8]) -> StorageResult<()> {
        let current = self.faults.bytes_written.load(Ordering::SeqCst);
        let threshold = self.faults.fail_after_bytes.load(Ordering::SeqCst);

        if current >= threshold {
            return Err(self.faults.inject("write"));
        }
        if current + data.len() > threshold {
            let partial = threshold - current;
            self.inner.write_all(&data[..partial])?;
            self.faults.bytes_written.fetch_add(partial, Ordering::SeqCst);
            return Err(self.faults.inject("partial write"));
        }

        self.inner.write_all(data)?;
        self.faults
            .bytes_written
            .fetch_add(data.len(), Ordering::SeqCst);
        Ok(())
    }

    fn close(self) -> StorageResult<()> {
        if self.faults.fail_close.load(Ordering::SeqCst) {
            return Err(self.faults.inject("close"));
        }
        self.inner.close()
    }
}

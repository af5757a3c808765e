//! In-memory filesystem for testing.

use crate::backend::{DirEntry, LogFile, LogFs};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct Shared {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    write_protected: AtomicBool,
    opens: AtomicUsize,
    writes: AtomicUsize,
}

/// An in-memory filesystem.
///
/// This filesystem keeps every directory and file in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Running the recorder on a host without a storage medium
///
/// Cloning returns another handle to the same tree, so a test can keep one
/// handle for inspection while the recorder owns the other.
///
/// # Thread Safety
///
/// This filesystem is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use beacon_storage::{InMemoryFs, LogFs};
/// use std::path::Path;
///
/// let fs = InMemoryFs::new();
/// fs.create_dir(Path::new("/a/b")).unwrap();
/// assert!(fs.is_dir(Path::new("/a")));
/// assert!(fs.is_dir(Path::new("/a/b")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryFs {
    shared: Arc<Shared>,
}

impl InMemoryFs {
    /// Creates a new empty filesystem with only the root directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a file with the given contents, creating parent
    /// directories as needed.
    ///
    /// Useful for preparing directories left behind by an earlier run.
    pub fn insert_file(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut nodes = self.shared.nodes.write();
        if let Some(parent) = path.parent() {
            for ancestor in parent.ancestors().filter(|p| !is_root(p)) {
                nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
            }
        }
        nodes.insert(path.to_path_buf(), Node::File(data.into()));
    }

    /// Returns a copy of the file contents at `path`, if it is a file.
    #[must_use]
    pub fn data(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.shared.nodes.read().get(path.as_ref()) {
            Some(Node::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Returns the paths of all files, in sorted order.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.shared
            .nodes
            .read()
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Makes every mutating operation fail with [`StorageError::WriteProtected`].
    ///
    /// Models the write-protect switch of a removable card.
    pub fn set_write_protected(&self, protected: bool) {
        self.shared
            .write_protected
            .store(protected, Ordering::SeqCst);
    }

    /// Returns the number of successful [`LogFs::open_append`] calls.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Returns the number of successful [`LogFile::write_all`] calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.shared.write_protected.load(Ordering::SeqCst) {
            return Err(StorageError::WriteProtected);
        }
        Ok(())
    }
}

fn is_root(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new("/")
}

fn is_dir_in(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> bool {
    is_root(path) || matches!(nodes.get(path), Some(Node::Dir))
}

impl LogFs for InMemoryFs {
    type File = InMemoryFile;

    fn exists(&self, path: &Path) -> bool {
        is_root(path) || self.shared.nodes.read().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        is_dir_in(&self.shared.nodes.read(), path)
    }

    fn create_dir(&self, path: &Path) -> StorageResult<()> {
        self.check_writable()?;
        let mut nodes = self.shared.nodes.write();

        // Walk from the outermost ancestor inwards.
        let mut missing: Vec<&Path> = path.ancestors().filter(|p| !is_root(p)).collect();
        missing.reverse();
        for dir in missing {
            match nodes.get(dir) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(StorageError::AlreadyExists {
                        path: dir.to_path_buf(),
                    })
                }
                None => {
                    nodes.insert(dir.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn open_append(&self, path: &Path) -> StorageResult<InMemoryFile> {
        self.check_writable()?;
        let mut nodes = self.shared.nodes.write();

        if let Some(parent) = path.parent() {
            if !is_dir_in(&nodes, parent) {
                return Err(StorageError::not_found(parent));
            }
        }
        match nodes.get(path) {
            Some(Node::Dir) => {
                return Err(StorageError::AlreadyExists {
                    path: path.to_path_buf(),
                })
            }
            Some(Node::File(_)) => {}
            None => {
                nodes.insert(path.to_path_buf(), Node::File(Vec::new()));
            }
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);

        Ok(InMemoryFile {
            fs: self.clone(),
            path: path.to_path_buf(),
        })
    }

    fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let nodes = self.shared.nodes.read();
        if !is_root(path) {
            match nodes.get(path) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(StorageError::not_a_directory(path)),
                None => return Err(StorageError::not_found(path)),
            }
        }

        let entries = nodes
            .iter()
            .filter(|(child, _)| match child.parent() {
                Some(parent) if is_root(path) => is_root(parent),
                Some(parent) => parent == path,
                None => false,
            })
            .map(|(child, node)| match node {
                Node::Dir => DirEntry {
                    path: child.clone(),
                    is_dir: true,
                    len: 0,
                },
                Node::File(data) => DirEntry {
                    path: child.clone(),
                    is_dir: false,
                    len: data.len() as u64,
                },
            })
            .collect();
        Ok(entries)
    }

    fn remove(&self, path: &Path) -> StorageResult<()> {
        self.check_writable()?;
        let mut nodes = self.shared.nodes.write();
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            }),
            None => Err(StorageError::not_found(path)),
        }
    }
}

/// An open file inside an [`InMemoryFs`].
#[derive(Debug)]
pub struct InMemoryFile {
    fs: InMemoryFs,
    path: PathBuf,
}

impl LogFile for InMemoryFile {
    fn write_all(&mut self, data: &[u8]) -> StorageResult<()> {
        self.fs.check_writable()?;
        let mut nodes = self.fs.shared.nodes.write();
        match nodes.get_mut(&self.path) {
            Some(Node::File(contents)) => {
                contents.extend_from_slice(data);
                self.fs.shared.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            // Removed behind our back.
            _ => Err(StorageError::not_found(&self.path)),
        }
    }

    fn close(self) -> StorageResult<()> {
        // Nothing is buffered
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_has_only_root() {
        let fs = InMemoryFs::new();
        assert!(fs.exists(Path::new("/")));
        assert!(fs.is_dir(Path::new("/")));
        assert!(fs.read_dir(Path::new("/")).unwrap().is_empty());
    }

    #[test]
    fn memory_create_dir_is_idempotent() {
        let fs = InMemoryFs::new();
        fs.create_dir(Path::new("/logs")).unwrap();
        fs.create_dir(Path::new("/logs")).unwrap();
        assert!(fs.is_dir(Path::new("/logs")));
    }

    #[test]
    fn memory_create_dir_creates_parents() {
        let fs = InMemoryFs::new();
        fs.create_dir(Path::new("/a/b/c")).unwrap();
        assert!(fs.is_dir(Path::new("/a")));
        assert!(fs.is_dir(Path::new("/a/b")));
        assert!(fs.is_dir(Path::new("/a/b/c")));
    }

    #[test]
    fn memory_create_dir_over_file_fails() {
        let fs = InMemoryFs::new();
        fs.insert_file("/logs", b"x".to_vec());
        let result = fs.create_dir(Path::new("/logs"));
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn memory_append_accumulates() {
        let fs = InMemoryFs::new();
        fs.create_dir(Path::new("/logs")).unwrap();

        let mut file = fs.open_append(Path::new("/logs/0.log")).unwrap();
        file.write_all(b"hello").unwrap();
        file.close().unwrap();

        let mut file = fs.open_append(Path::new("/logs/0.log")).unwrap();
        file.write_all(b" world").unwrap();
        file.close().unwrap();

        assert_eq!(fs.data("/logs/0.log").unwrap(), b"hello world");
        assert_eq!(fs.open_count(), 2);
        assert_eq!(fs.write_count(), 2);
    }

    #[test]
    fn memory_open_without_parent_fails() {
        let fs = InMemoryFs::new();
        let result = fs.open_append(Path::new("/missing/0.log"));
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        assert!(!fs.exists(Path::new("/missing/0.log")));
    }

    #[test]
    fn memory_read_dir_lists_direct_children() {
        let fs = InMemoryFs::new();
        fs.insert_file("/logs/a.log", Vec::new());
        fs.insert_file("/logs/b.log", b"123".to_vec());
        fs.insert_file("/logs/nested/c.log", b"1".to_vec());
        fs.insert_file("/other.log", Vec::new());

        let entries = fs.read_dir(Path::new("/logs")).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/logs/a.log"),
                PathBuf::from("/logs/b.log"),
                PathBuf::from("/logs/nested"),
            ]
        );
        assert_eq!(entries[1].len, 3);
        assert!(entries[2].is_dir);
    }

    #[test]
    fn memory_read_dir_on_file_fails() {
        let fs = InMemoryFs::new();
        fs.insert_file("/logs", b"not a dir".to_vec());
        let result = fs.read_dir(Path::new("/logs"));
        assert!(matches!(result, Err(StorageError::NotADirectory { .. })));
    }

    #[test]
    fn memory_remove_file() {
        let fs = InMemoryFs::new();
        fs.insert_file("/logs/a.log", Vec::new());
        fs.remove(Path::new("/logs/a.log")).unwrap();
        assert!(!fs.exists(Path::new("/logs/a.log")));
        assert!(fs.remove(Path::new("/logs/a.log")).is_err());
    }

    #[test]
    fn memory_write_protected_refuses_writes() {
        let fs = InMemoryFs::new();
        fs.create_dir(Path::new("/logs")).unwrap();
        let mut file = fs.open_append(Path::new("/logs/0.log")).unwrap();

        fs.set_write_protected(true);
        assert!(matches!(
            fs.open_append(Path::new("/logs/0.log")),
            Err(StorageError::WriteProtected)
        ));
        assert!(matches!(file.write_all(b"x"), Err(StorageError::WriteProtected)));

        fs.set_write_protected(false);
        file.write_all(b"x").unwrap();
        assert_eq!(fs.data("/logs/0.log").unwrap(), b"x");
    }

    #[test]
    fn memory_clones_share_state() {
        let fs = InMemoryFs::new();
        let other = fs.clone();
        fs.insert_file("/x.log", b"abc".to_vec());
        assert_eq!(other.data("/x.log").unwrap(), b"abc");
        assert_eq!(other.files(), vec![PathBuf::from("/x.log")]);
    }
}

//! # Beacon Storage
//!
//! Filesystem collaborator for the beacon log recorder.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! recorder. Filesystems are **opaque byte sinks** - they do not interpret
//! the log lines they store.
//!
//! ## Design Principles
//!
//! - The contract is the small subset a removable medium driver offers:
//!   existence checks, directory creation and listing, append-only files,
//!   removal
//! - No knowledge of record formats, slots or sessions
//! - Must be `Send + Sync` so producer and flush contexts can share it
//!
//! ## Available Filesystems
//!
//! - [`InMemoryFs`] - For testing and hardware-free runs
//! - [`StdFs`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use beacon_storage::{InMemoryFs, LogFile, LogFs};
//! use std::path::Path;
//!
//! let fs = InMemoryFs::new();
//! fs.create_dir(Path::new("/logs")).unwrap();
//! let mut file = fs.open_append(Path::new("/logs/0.log")).unwrap();
//! file.write_all(b"hello world").unwrap();
//! file.close().unwrap();
//! assert_eq!(fs.data(Path::new("/logs/0.log")).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{DirEntry, LogFile, LogFs};
pub use error::{StorageError, StorageResult};
pub use file::{StdFile, StdFs};
pub use memory::{InMemoryFile, InMemoryFs};

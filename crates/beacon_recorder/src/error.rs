//! Error types for the beacon recorder.

use crate::slot::SlotLabel;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for recorder operations.
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Errors that can occur in recorder operations.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Storage medium error. The recorder marks the medium unusable.
    #[error("storage error: {0}")]
    Storage(#[from] beacon_storage::StorageError),

    /// A slot buffer could not be allocated.
    #[error("cannot allocate {bytes} bytes for slot {slot}")]
    Allocation {
        /// The slot that failed.
        slot: SlotLabel,
        /// The requested capacity.
        bytes: usize,
    },

    /// Every candidate file name in the folder is taken.
    #[error("no free log file name in {} below index {limit}", folder.display())]
    NameSpaceExhausted {
        /// The log folder.
        folder: PathBuf,
        /// The exclusive upper bound on the file index.
        limit: u32,
    },

    /// The operation needs an open session.
    #[error("no session is open")]
    NotWriting,

    /// The configuration is inconsistent.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl RecorderError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Errors produced while encoding or parsing beacon log lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// An identifier is too long or contains a forbidden byte.
    #[error("invalid identifier: {reason}")]
    InvalidId {
        /// Why the identifier was rejected.
        reason: String,
    },

    /// The encoded record does not fit in the scratch buffer.
    #[error("record does not fit in {capacity} bytes")]
    TooLong {
        /// Size of the scratch buffer.
        capacity: usize,
    },

    /// A line has the wrong number of fields.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Fields in the log format.
        expected: usize,
        /// Fields present in the line.
        found: usize,
    },

    /// A field could not be parsed.
    #[error("invalid value {value:?} for field {field}")]
    InvalidField {
        /// The field name.
        field: &'static str,
        /// The raw text.
        value: String,
    },

    /// A line is not valid UTF-8.
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

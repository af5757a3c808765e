//! # Beacon Recorder
//!
//! Double-buffered recorder for drone beacon observations.
//!
//! Records arrive from a radio receiver at unpredictable times and must be
//! accepted without waiting for storage. The recorder keeps two fixed
//! slots: producers append encoded records to the active slot, and a
//! separate flush context periodically writes the other slot to a log file
//! on removable storage. When neither slot has room, records are dropped
//! and counted rather than blocking the producer.
//!
//! This crate provides:
//! - [`Recorder`], the two-slot buffer with its append, flush and session
//!   operations
//! - [`BeaconRecord`], the fixed comma-separated line format
//! - Log folder management (pruning, file naming, rotation)
//! - [`WideClock`], a 64-bit microsecond clock over a wrapping 32-bit counter
//! - [`PeriodicFlusher`], a background flush thread for hosted targets
//!
//! Storage is abstracted by [`beacon_storage::LogFs`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod flusher;
mod record;
mod recorder;
mod session;
mod slot;
mod stats;

pub use clock::{Clock32, SystemClock32, WideClock};
pub use config::{FileNameTemplate, RecorderConfig, DEFAULT_MAX_FILE_INDEX, DEFAULT_SLOT_CAPACITY};
pub use error::{RecordError, RecorderError, RecorderResult};
pub use flusher::PeriodicFlusher;
pub use record::{
    AnsiId, BeaconId, BeaconRecord, FrameId, LogLines, ANSI_ID_MAX, FIELD_COUNT, FRAME_ID_MAX,
    MAX_RECORD_LEN,
};
pub use recorder::{AppendOutcome, CloseOutcome, FlushOutcome, Recorder};
pub use session::{
    ensure_directory, next_free_path, prune_empty_files, PruneReport, Session, LOG_EXTENSION,
};
pub use slot::{Slot, SlotGuard, SlotLabel};
pub use stats::{RecorderStats, StatsSnapshot};

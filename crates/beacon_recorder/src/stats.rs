//! Recorder statistics.
//!
//! Counters for the append and flush paths, readable at any time from any
//! context.
//!
//! # Usage
//!
//! ```rust,ignore
//! let stats = recorder.stats().snapshot();
//! println!("dropped: {}", stats.records_dropped);
//! println!("last flush took {} us", stats.last_flush_micros);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Recorder statistics.
///
/// All counters are atomic and can be read while a flush is in progress.
/// Values only increase, except `last_flush_micros`.
#[derive(Debug, Default)]
pub struct RecorderStats {
    // Append path
    /// Records or raw writes accepted into a slot.
    records_appended: AtomicU64,
    /// Bytes accepted into a slot.
    bytes_appended: AtomicU64,
    /// Records or raw writes discarded because no slot had room.
    records_dropped: AtomicU64,
    /// Number of times the active slot changed.
    swaps: AtomicU64,

    // Flush path
    /// Successful flushes (including session drains).
    flushes: AtomicU64,
    /// Bytes handed to the filesystem.
    bytes_flushed: AtomicU64,
    /// Flushes that failed on open, write or close.
    flush_failures: AtomicU64,
    /// Flushes rejected because another flush held the guard.
    flushes_busy: AtomicU64,
    /// Duration of the most recent successful flush.
    last_flush_micros: AtomicU64,
    /// Automatic or explicit file rotations.
    rotations: AtomicU64,
}

impl RecorderStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, bytes: usize) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_swap(&self) {
        self.swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, bytes: usize, elapsed: Duration) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.bytes_flushed
            .fetch_add(bytes as u64, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_flush_micros.store(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush_busy(&self) {
        self.flushes_busy.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of accepted writes.
    pub fn records_appended(&self) -> u64 {
        self.records_appended.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes accepted into slots.
    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended.load(Ordering::Relaxed)
    }

    /// Returns the number of dropped writes.
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of slot swaps.
    pub fn swaps(&self) -> u64 {
        self.swaps.load(Ordering::Relaxed)
    }

    /// Returns the number of successful flushes.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes written to storage.
    pub fn bytes_flushed(&self) -> u64 {
        self.bytes_flushed.load(Ordering::Relaxed)
    }

    /// Returns the number of failed flushes.
    pub fn flush_failures(&self) -> u64 {
        self.flush_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of flushes rejected by the reentrancy guard.
    pub fn flushes_busy(&self) -> u64 {
        self.flushes_busy.load(Ordering::Relaxed)
    }

    /// Returns the duration of the last successful flush in microseconds.
    pub fn last_flush_micros(&self) -> u64 {
        self.last_flush_micros.load(Ordering::Relaxed)
    }

    /// Returns the number of file rotations.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all stats.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_appended: self.records_appended(),
            bytes_appended: self.bytes_appended(),
            records_dropped: self.records_dropped(),
            swaps: self.swaps(),
            flushes: self.flushes(),
            bytes_flushed: self.bytes_flushed(),
            flush_failures: self.flush_failures(),
            flushes_busy: self.flushes_busy(),
            last_flush_micros: self.last_flush_micros(),
            rotations: self.rotations(),
        }
    }
}

/// A point-in-time snapshot of recorder statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Accepted writes.
    pub records_appended: u64,
    /// Bytes accepted into slots.
    pub bytes_appended: u64,
    /// Dropped writes.
    pub records_dropped: u64,
    /// Slot swaps.
    pub swaps: u64,
    /// Successful flushes.
    pub flushes: u64,
    /// Bytes written to storage.
    pub bytes_flushed: u64,
    /// Failed flushes.
    pub flush_failures: u64,
    /// Flushes rejected by the reentrancy guard.
    pub flushes_busy: u64,
    /// Duration of the last successful flush in microseconds.
    pub last_flush_micros: u64,
    /// File rotations.
    pub rotations: u64,
}

//! The double-buffered recorder.
//!
//! Two fixed slots alternate: producers append to the *active* slot while the
//! flush path writes the *other* slot to the session's log file.
//!
//! ```text
//!  producer ──encode──▶ [active slot] ──swap when nearly full──┐
//!                                                              ▼
//!  flush context ◀──write + reset── [non-active slot] ◀────────┘
//! ```
//!
//! # Concurrency
//!
//! The append path and the flush path work on different slots. The active
//! flag only changes while the producer holds the lock of the slot it points
//! to, and only when the other slot is empty, so the flush path never sees a
//! slot that is still being filled. Each slot lock is held for one memory
//! copy by producers; no thread holds two slot locks except
//! [`Recorder::close_session`], which runs after writing is disabled.
//!
//! Overlapping flushes are rejected by a compare-and-set guard, not queued.
//! Closing a session drains both slots without consulting that guard.

use crate::config::RecorderConfig;
use crate::error::{RecorderError, RecorderResult};
use crate::record::{BeaconRecord, MAX_RECORD_LEN};
use crate::session::{self, PruneReport, Session};
use crate::slot::{Slot, SlotGuard, SlotLabel};
use crate::stats::RecorderStats;
use beacon_storage::{LogFile, LogFs, StorageError};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Result of a write on the append path.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The bytes were copied into `slot`.
    Appended {
        /// The slot that received the bytes.
        slot: SlotLabel,
        /// Whether this write made `slot` the active slot.
        swapped: bool,
    },
    /// No slot had room; nothing changed.
    Dropped,
    /// No session is open; nothing changed.
    Disabled,
}

impl AppendOutcome {
    /// Returns true if the bytes were stored.
    #[must_use]
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

/// Result of a successful call to [`Recorder::flush`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush is in progress; nothing was touched.
    Busy,
    /// The non-active slot was empty.
    Idle,
    /// The non-active slot was written and reset.
    Written {
        /// The slot that was written.
        slot: SlotLabel,
        /// Number of bytes written.
        bytes: usize,
        /// Time spent opening, writing and closing the file.
        elapsed: Duration,
    },
}

/// Result of a successful call to [`Recorder::close_session`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// No session was open.
    NotOpen,
    /// The session was drained and closed.
    Closed {
        /// The file that was closed.
        path: PathBuf,
        /// Bytes written by the final drain.
        bytes: usize,
    },
}

/// Releases the flush guard when dropped.
struct FlushGuard<'a>(&'a AtomicBool);

impl<'a> FlushGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Buffers encoded beacon records in two alternating slots and writes them
/// to append-only log files.
///
/// A `Recorder` is an ordinary value: share it between the producer and the
/// flush context by reference or through an `Arc`.
///
/// # Example
///
/// ```rust
/// use beacon_recorder::{BeaconRecord, FlushOutcome, Recorder, RecorderConfig};
/// use beacon_storage::InMemoryFs;
///
/// let fs = InMemoryFs::new();
/// let recorder = Recorder::new(fs.clone(), RecorderConfig::new().folder("/beacons")).unwrap();
/// let path = recorder.open_session().unwrap();
///
/// assert!(recorder.append_record(&BeaconRecord::default()).is_appended());
/// assert_eq!(recorder.flush().unwrap(), FlushOutcome::Idle); // record sits in the active slot
///
/// let _ = recorder.close_session().unwrap();
/// assert_eq!(fs.data(&path).unwrap(), b",,0,0,0,0,0,0,0,0,0,0\n");
/// ```
pub struct Recorder<F: LogFs> {
    fs: F,
    config: RecorderConfig,
    slots: [Slot; 2],
    /// false = A, true = B.
    active_b: AtomicBool,
    writing: AtomicBool,
    flushing: AtomicBool,
    storage_usable: AtomicBool,
    session: Mutex<Option<Session>>,
    stats: RecorderStats,
}

impl<F: LogFs> Recorder<F> {
    /// Validates `config` and allocates both slots.
    ///
    /// No session is open afterwards; call [`Recorder::open_session`].
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::InvalidConfig`] for an unusable
    /// configuration and [`RecorderError::Allocation`] if either slot cannot
    /// be allocated. The recorder must not be used in either case.
    pub fn new(fs: F, config: RecorderConfig) -> RecorderResult<Self> {
        config.validate()?;

        let allocate = |label| {
            Slot::allocate(label, config.slot_capacity).map_err(|e| {
                error!(slot = %label, bytes = config.slot_capacity, "cannot allocate slot buffer");
                e
            })
        };
        let slots = [allocate(SlotLabel::A)?, allocate(SlotLabel::B)?];

        Ok(Self {
            fs,
            config,
            slots,
            active_b: AtomicBool::new(false),
            writing: AtomicBool::new(false),
            flushing: AtomicBool::new(false),
            storage_usable: AtomicBool::new(true),
            session: Mutex::new(None),
            stats: RecorderStats::new(),
        })
    }

    // === Session lifecycle ===

    /// Creates the log folder if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error, and marks the medium unusable, if the folder cannot
    /// be created or a file is in the way.
    pub fn ensure_directory(&self) -> RecorderResult<()> {
        session::ensure_directory(&self.fs, &self.config.folder).map_err(|e| match e {
            RecorderError::Storage(e) => self.storage_fault(e),
            other => other,
        })
    }

    /// Deletes empty `.log` files left in the log folder by earlier runs.
    ///
    /// # Errors
    ///
    /// Returns an error, without deleting anything, if the folder is not a
    /// directory.
    pub fn prune_empty_files(&self) -> RecorderResult<PruneReport> {
        session::prune_empty_files(&self.fs, &self.config.folder)
    }

    /// Opens a new session on the first unused file name.
    ///
    /// An already open session is closed (and drained) first. On success
    /// both slots are empty, slot A is active, the storage flag is reset and
    /// writing is enabled. The file itself is created by the first flush.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::NameSpaceExhausted`] if every file index is
    /// taken, or a storage error if the folder cannot be prepared. Writing
    /// stays disabled and no file is created.
    pub fn open_session(&self) -> RecorderResult<PathBuf> {
        if self.is_writing() {
            let _ = self.close_session()?;
        }

        self.ensure_directory()?;
        if self.config.prune_on_open {
            if let Err(e) = self.prune_empty_files() {
                warn!(error = %e, "pruning empty log files failed");
            }
        }

        let mut current = self.session.lock();
        let (index, path) = session::next_free_path(
            &self.fs,
            &self.config.folder,
            &self.config.file_name,
            0,
            self.config.max_file_index,
        )?;
        info!(path = %path.display(), "current log file");

        for slot in &self.slots {
            slot.lock().reset();
        }
        self.set_active(SlotLabel::A);
        self.storage_usable.store(true, Ordering::Release);
        *current = Some(Session::new(path.clone(), index));
        self.writing.store(true, Ordering::Release);

        Ok(path)
    }

    /// Closes the session, writing every buffered byte first.
    ///
    /// Does nothing if no session is open. Otherwise writing is disabled and
    /// both slots are written (non-active first, then active) regardless of
    /// any flush in progress. Callers should not race this with
    /// [`Recorder::flush`].
    ///
    /// # Errors
    ///
    /// Returns a storage error if the final drain fails; the session is
    /// closed anyway and the medium marked unusable.
    pub fn close_session(&self) -> RecorderResult<CloseOutcome> {
        if !self.writing.swap(false, Ordering::AcqRel) {
            return Ok(CloseOutcome::NotOpen);
        }

        let mut current = self.session.lock();
        let result = match current.as_mut() {
            Some(session) => self.drain(session),
            None => Ok(0),
        };
        let closed = current.take();
        drop(current);

        let bytes = result?;
        let path = closed.map(|s| s.path().to_path_buf()).unwrap_or_default();
        info!(path = %path.display(), bytes, "log file closed");
        Ok(CloseOutcome::Closed { path, bytes })
    }

    /// Moves subsequent flushes to the next unused file name.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::NotWriting`] without a session and
    /// [`RecorderError::NameSpaceExhausted`] if no later name is free.
    pub fn rotate(&self) -> RecorderResult<PathBuf> {
        let mut current = self.session.lock();
        match current.as_mut() {
            Some(session) if self.is_writing() => self.rotate_locked(session),
            _ => Err(RecorderError::NotWriting),
        }
    }

    fn rotate_locked(&self, session: &mut Session) -> RecorderResult<PathBuf> {
        let (index, path) = session::next_free_path(
            &self.fs,
            &self.config.folder,
            &self.config.file_name,
            session.index().saturating_add(1),
            self.config.max_file_index,
        )?;
        info!(
            from = %session.path().display(),
            to = %path.display(),
            "rotating log file"
        );
        *session = Session::new(path.clone(), index);
        self.stats.record_rotation();
        Ok(path)
    }

    // === Append path ===

    /// Encodes `record` and appends it to the active slot.
    ///
    /// See [`Recorder::write_bytes`] for the overflow policy. A record that
    /// does not fit the scratch buffer is dropped.
    pub fn append_record(&self, record: &BeaconRecord) -> AppendOutcome {
        if !self.is_writing() {
            return AppendOutcome::Disabled;
        }

        let mut scratch = [0u8; MAX_RECORD_LEN];
        match record.encode_into(&mut scratch) {
            Ok(len) => self.write_bytes(&scratch[..len]),
            Err(e) => {
                trace!(error = %e, "record dropped");
                self.stats.record_drop();
                AppendOutcome::Dropped
            }
        }
    }

    /// Appends raw bytes to the active slot.
    ///
    /// This is the single primitive behind every write:
    /// 1. without an open session nothing happens, and bytes that could
    ///    never fit in a slot are dropped;
    /// 2. if the active slot has no room and the other slot still holds
    ///    unflushed bytes, the write is dropped;
    /// 3. if the active slot would come within the reserve margin of its
    ///    capacity and the other slot is empty, the slots swap first;
    /// 4. the bytes are copied into the active slot.
    ///
    /// Never allocates and never waits for storage.
    pub fn write_bytes(&self, bytes: &[u8]) -> AppendOutcome {
        if !self.is_writing() {
            return AppendOutcome::Disabled;
        }

        let len = bytes.len();
        let capacity = self.config.slot_capacity;
        let margin = self.config.reserve_margin;
        if len > capacity {
            return self.dropped(len);
        }

        let mut active = self.active_slot();
        let mut guard = self.slots[active.index()].lock();
        // A swap can only happen under the old active slot's lock, so once
        // the flag agrees with the lock we hold it stays put.
        while self.active_slot() != active {
            drop(guard);
            active = self.active_slot();
            guard = self.slots[active.index()].lock();
        }
        if !self.is_writing() {
            return AppendOutcome::Disabled;
        }

        let other = &self.slots[active.other().index()];
        let fill = guard.len();

        if fill + len >= capacity && !other.is_empty() {
            return self.dropped(len);
        }

        if fill + len + margin >= capacity && other.is_empty() {
            let next = active.other();
            self.set_active(next);
            self.stats.record_swap();
            debug!(from = %active, to = %next, fill, "switched slot");
            drop(guard);

            let mut guard = other.lock();
            if !self.is_writing() {
                return AppendOutcome::Disabled;
            }
            return self.push(&mut guard, next, bytes, true);
        }

        self.push(&mut guard, active, bytes, false)
    }

    fn push(
        &self,
        guard: &mut SlotGuard<'_>,
        slot: SlotLabel,
        bytes: &[u8],
        swapped: bool,
    ) -> AppendOutcome {
        if guard.push(bytes) {
            self.stats.record_append(bytes.len());
            AppendOutcome::Appended { slot, swapped }
        } else {
            self.dropped(bytes.len())
        }
    }

    fn dropped(&self, len: usize) -> AppendOutcome {
        trace!(bytes = len, "record dropped");
        self.stats.record_drop();
        AppendOutcome::Dropped
    }

    /// Appends one byte.
    pub fn write_u8(&self, value: u8) -> AppendOutcome {
        self.write_bytes(&[value])
    }

    /// Appends a little-endian `u16`.
    pub fn write_u16(&self, value: u16) -> AppendOutcome {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Appends a little-endian `i16`.
    pub fn write_i16(&self, value: i16) -> AppendOutcome {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Appends a little-endian `u32`.
    pub fn write_u32(&self, value: u32) -> AppendOutcome {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Appends a little-endian `i32`.
    pub fn write_i32(&self, value: i32) -> AppendOutcome {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Appends the bytes of `text`.
    pub fn write_str(&self, text: &str) -> AppendOutcome {
        self.write_bytes(text.as_bytes())
    }

    // === Flush path ===

    /// Writes the non-active slot to the log file and resets it.
    ///
    /// Returns [`FlushOutcome::Busy`] without touching anything if another
    /// flush is running, and [`FlushOutcome::Idle`] if there is nothing to
    /// write. The file is opened and closed within this call.
    ///
    /// # Errors
    ///
    /// On any storage failure the medium is marked unusable and the slot
    /// keeps its bytes, so a later flush can retry them. Returns
    /// [`RecorderError::NotWriting`] if data is buffered but no session is
    /// open.
    pub fn flush(&self) -> RecorderResult<FlushOutcome> {
        let Some(_guard) = FlushGuard::try_acquire(&self.flushing) else {
            trace!("flush already in progress");
            self.stats.record_flush_busy();
            return Ok(FlushOutcome::Busy);
        };

        let target = self.active_slot().other();
        if self.slots[target.index()].is_empty() {
            return Ok(FlushOutcome::Idle);
        }

        let mut current = self.session.lock();
        let Some(session) = current.as_mut() else {
            return Err(RecorderError::NotWriting);
        };

        let mut slot = self.slots[target.index()].lock();
        if self.active_slot() == target || slot.is_empty() {
            // Swapped while we were acquiring the lock.
            return Ok(FlushOutcome::Idle);
        }

        let start = Instant::now();
        let bytes = slot.len();
        if let Err(e) = self.write_out(session, &[slot.as_bytes()]) {
            self.stats.record_flush_failure();
            return Err(self.storage_fault(e));
        }
        slot.reset();
        drop(slot);
        let elapsed = start.elapsed();

        self.stats.record_flush(bytes, elapsed);
        debug!(
            slot = %target,
            bytes,
            elapsed_us = elapsed.as_micros() as u64,
            "flushed slot"
        );

        if let Some(limit) = self.config.rotate_after_bytes {
            if session.bytes_written() >= limit {
                if let Err(e) = self.rotate_locked(session) {
                    warn!(error = %e, "rotation failed, staying on current file");
                }
            }
        }

        Ok(FlushOutcome::Written {
            slot: target,
            bytes,
            elapsed,
        })
    }

    /// Writes both slots, non-active first. Caller holds the session lock.
    fn drain(&self, session: &mut Session) -> RecorderResult<usize> {
        let first = self.active_slot().other();
        let mut older = self.slots[first.index()].lock();
        let mut newer = self.slots[first.other().index()].lock();

        let total = older.len() + newer.len();
        if total == 0 {
            return Ok(0);
        }

        let start = Instant::now();
        if let Err(e) = self.write_out(session, &[older.as_bytes(), newer.as_bytes()]) {
            self.stats.record_flush_failure();
            return Err(self.storage_fault(e));
        }
        older.reset();
        newer.reset();
        let elapsed = start.elapsed();

        self.stats.record_flush(total, elapsed);
        debug!(
            bytes = total,
            elapsed_us = elapsed.as_micros() as u64,
            "drained slots"
        );
        Ok(total)
    }

    /// Appends `chunks` to the session file in one open/close cycle.
    fn write_out(&self, session: &mut Session, chunks: &[&[u8]]) -> Result<(), StorageError> {
        let mut file = self.fs.open_append(session.path())?;
        for chunk in chunks.iter().filter(|c| !c.is_empty()) {
            file.write_all(chunk)?;
            session.add_written(chunk.len());
        }
        file.close()
    }

    fn storage_fault(&self, err: StorageError) -> RecorderError {
        if self.storage_usable.swap(false, Ordering::AcqRel) {
            warn!(error = %err, "storage medium unusable");
        }
        RecorderError::Storage(err)
    }

    // === State ===

    fn set_active(&self, label: SlotLabel) {
        self.active_b
            .store(label == SlotLabel::B, Ordering::Release);
    }

    /// Returns the slot currently receiving writes.
    #[must_use]
    pub fn active_slot(&self) -> SlotLabel {
        if self.active_b.load(Ordering::Acquire) {
            SlotLabel::B
        } else {
            SlotLabel::A
        }
    }

    /// Returns the fill length of `slot`.
    #[must_use]
    pub fn fill(&self, slot: SlotLabel) -> usize {
        self.slots[slot.index()].len()
    }

    /// Returns the capacity of each slot.
    #[must_use]
    pub fn slot_capacity(&self) -> usize {
        self.config.slot_capacity
    }

    /// Returns true while a session is open and accepting writes.
    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.writing.load(Ordering::Acquire)
    }

    /// Returns true while a flush holds the reentrancy guard.
    #[must_use]
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Returns false once a storage operation has failed in this session.
    ///
    /// The flag is reset by [`Recorder::open_session`]; flushes keep being
    /// attempted while it is false.
    #[must_use]
    pub fn storage_usable(&self) -> bool {
        self.storage_usable.load(Ordering::Acquire)
    }

    /// Returns the path of the open session's file.
    #[must_use]
    pub fn session_path(&self) -> Option<PathBuf> {
        self.session.lock().as_ref().map(|s| s.path().to_path_buf())
    }

    /// Returns a copy of the open session.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    /// Returns the recorder statistics.
    #[must_use]
    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Returns the filesystem.
    #[must_use]
    pub fn fs(&self) -> &F {
        &self.fs
    }
}

impl<F: LogFs> std::fmt::Debug for Recorder<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("folder", &self.config.folder)
            .field("active", &self.active_slot())
            .field("fill_a", &self.fill(SlotLabel::A))
            .field("fill_b", &self.fill(SlotLabel::B))
            .field("writing", &self.is_writing())
            .field("storage_usable", &self.storage_usable())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FrameId, LogLines};
    use beacon_storage::{InMemoryFs, StdFs};
    use std::path::Path;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    const CAPACITY: usize = 512;
    const MARGIN: usize = 16;

    fn test_config() -> RecorderConfig {
        RecorderConfig::new()
            .folder("/beacons")
            .slot_capacity(CAPACITY)
            .reserve_margin(MARGIN)
    }

    fn open_recorder() -> (InMemoryFs, Recorder<InMemoryFs>) {
        let fs = InMemoryFs::new();
        let recorder = Recorder::new(fs.clone(), test_config()).unwrap();
        recorder.open_session().unwrap();
        (fs, recorder)
    }

    fn record(n: u32) -> BeaconRecord {
        BeaconRecord {
            frame_id: FrameId::new(&format!("DRONE{n}")).unwrap(),
            lat: n as i32,
            last_seen: u64::from(n) * 1_000,
            ..BeaconRecord::default()
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let result = Recorder::new(InMemoryFs::new(), test_config().slot_capacity(64));
        assert!(matches!(result, Err(RecorderError::InvalidConfig { .. })));
    }

    #[test]
    fn writes_are_disabled_before_open() {
        let recorder = Recorder::new(InMemoryFs::new(), test_config()).unwrap();
        assert!(!recorder.is_writing());
        assert_eq!(recorder.write_u8(1), AppendOutcome::Disabled);
        assert_eq!(recorder.append_record(&record(1)), AppendOutcome::Disabled);
        assert_eq!(recorder.fill(SlotLabel::A), 0);
    }

    #[test]
    fn open_session_resets_state() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.is_writing());
        assert!(recorder.storage_usable());
        assert_eq!(recorder.active_slot(), SlotLabel::A);
        assert_eq!(recorder.session_path().unwrap(), Path::new("/beacons/0.log"));
        assert!(fs.is_dir(Path::new("/beacons")));
        // The file appears on first flush.
        assert!(!fs.exists(Path::new("/beacons/0.log")));
    }

    #[test]
    fn open_session_picks_next_free_name() {
        let fs = InMemoryFs::new();
        for i in 0..5 {
            fs.insert_file(format!("/beacons/log_{i}"), b"x".to_vec());
        }
        let config = test_config().file_name("log_{index}".parse().unwrap());
        let recorder = Recorder::new(fs, config).unwrap();

        let path = recorder.open_session().unwrap();
        assert_eq!(path, Path::new("/beacons/log_5"));
    }

    #[test]
    fn open_session_prunes_empty_logs() {
        let fs = InMemoryFs::new();
        fs.insert_file("/beacons/0.log", Vec::new());
        fs.insert_file("/beacons/1.log", b"A,B,1,2,3,4,5,6,7,8,9,10\n".to_vec());
        let recorder = Recorder::new(fs.clone(), test_config()).unwrap();

        let path = recorder.open_session().unwrap();
        // 0.log was empty and removed, so its name is free again.
        assert_eq!(path, Path::new("/beacons/0.log"));
        assert!(fs.exists(Path::new("/beacons/1.log")));
    }

    #[test]
    fn open_session_fails_when_names_exhausted() {
        let fs = InMemoryFs::new();
        for i in 0..3 {
            fs.insert_file(format!("/beacons/{i}.log"), b"x".to_vec());
        }
        let recorder = Recorder::new(fs.clone(), test_config().max_file_index(3)).unwrap();

        let result = recorder.open_session();
        assert!(matches!(result, Err(RecorderError::NameSpaceExhausted { .. })));
        assert!(!recorder.is_writing());
        assert_eq!(fs.files().len(), 3);
    }

    #[test]
    fn open_session_fails_on_file_in_place_of_folder() {
        let fs = InMemoryFs::new();
        fs.insert_file("/beacons", b"x".to_vec());
        let recorder = Recorder::new(fs, test_config()).unwrap();

        assert!(recorder.open_session().is_err());
        assert!(!recorder.is_writing());
        assert!(!recorder.storage_usable());
    }

    #[test]
    fn append_goes_to_active_slot() {
        let (_fs, recorder) = open_recorder();
        let outcome = recorder.write_bytes(&[7u8; 100]);
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                slot: SlotLabel::A,
                swapped: false
            }
        );
        assert_eq!(recorder.fill(SlotLabel::A), 100);
        assert_eq!(recorder.fill(SlotLabel::B), 0);
    }

    #[test]
    fn swap_when_within_margin_and_other_empty() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());

        // 400 + 100 + 16 >= 512
        let outcome = recorder.write_bytes(&[2u8; 100]);
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                slot: SlotLabel::B,
                swapped: true
            }
        );
        assert_eq!(recorder.active_slot(), SlotLabel::B);
        assert_eq!(recorder.fill(SlotLabel::A), 400);
        assert_eq!(recorder.fill(SlotLabel::B), 100);
        assert_eq!(recorder.stats().swaps(), 1);

        // Slot A is handed to the flush path untouched.
        let outcome = recorder.flush().unwrap();
        assert!(matches!(
            outcome,
            FlushOutcome::Written {
                slot: SlotLabel::A,
                bytes: 400,
                ..
            }
        ));
        assert_eq!(fs.data("/beacons/0.log").unwrap(), vec![1u8; 400]);
    }

    #[test]
    fn no_swap_while_other_slot_is_pending() {
        let (_fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 100]).is_appended()); // swap to B
        assert!(recorder.write_bytes(&[3u8; 350]).is_appended()); // B = 450

        // 450 + 50 < 512 but within the margin; A is still pending, so no swap.
        let outcome = recorder.write_bytes(&[4u8; 50]);
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                slot: SlotLabel::B,
                swapped: false
            }
        );
        assert_eq!(recorder.fill(SlotLabel::B), 500);
    }

    #[test]
    fn drop_when_both_slots_hold_data() {
        let (_fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 100]).is_appended()); // swap to B

        // 100 + 420 >= 512 and A still holds unflushed bytes.
        let outcome = recorder.write_bytes(&[3u8; 420]);
        assert_eq!(outcome, AppendOutcome::Dropped);
        assert_eq!(recorder.fill(SlotLabel::A), 400);
        assert_eq!(recorder.fill(SlotLabel::B), 100);
        assert_eq!(recorder.active_slot(), SlotLabel::B);
        assert_eq!(recorder.stats().records_dropped(), 1);

        // Once A is flushed the same write swaps back to A.
        let _ = recorder.flush().unwrap();
        let outcome = recorder.write_bytes(&[3u8; 420]);
        assert_eq!(
            outcome,
            AppendOutcome::Appended {
                slot: SlotLabel::A,
                swapped: true
            }
        );
    }

    #[test]
    fn oversized_write_is_dropped() {
        let (_fs, recorder) = open_recorder();
        assert_eq!(
            recorder.write_bytes(&[0u8; CAPACITY + 1]),
            AppendOutcome::Dropped
        );
        assert_eq!(recorder.fill(SlotLabel::A), 0);
        assert_eq!(recorder.active_slot(), SlotLabel::A);
    }

    #[test]
    fn large_write_swaps_into_empty_slot() {
        let (_fs, recorder) = open_recorder();
        assert_eq!(
            recorder.write_bytes(&[9u8; 500]),
            AppendOutcome::Appended {
                slot: SlotLabel::B,
                swapped: true
            }
        );
        assert_eq!(recorder.fill(SlotLabel::A), 0);
        assert_eq!(recorder.fill(SlotLabel::B), 500);
        assert_eq!(recorder.active_slot(), SlotLabel::B);
    }

    #[test]
    fn full_slot_write_fits_after_swap() {
        let (_fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; CAPACITY]).is_appended());
        assert_eq!(recorder.fill(SlotLabel::B), CAPACITY);

        // B is full and A is empty, so the next byte swaps back.
        assert_eq!(
            recorder.write_u8(2),
            AppendOutcome::Appended {
                slot: SlotLabel::A,
                swapped: true
            }
        );
        assert_eq!(recorder.write_bytes(&[3u8; CAPACITY]), AppendOutcome::Dropped);
    }

    #[test]
    fn primitives_are_little_endian() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_u8(0xAB).is_appended());
        assert!(recorder.write_u16(0x0102).is_appended());
        assert!(recorder.write_i16(-2).is_appended());
        assert!(recorder.write_u32(0x0A0B_0C0D).is_appended());
        assert!(recorder.write_i32(-1).is_appended());
        assert!(recorder.write_str("ok").is_appended());
        let _ = recorder.close_session().unwrap();

        assert_eq!(
            fs.data("/beacons/0.log").unwrap(),
            vec![
                0xAB, 0x02, 0x01, 0xFE, 0xFF, 0x0D, 0x0C, 0x0B, 0x0A, 0xFF, 0xFF, 0xFF, 0xFF,
                b'o', b'k'
            ]
        );
    }

    #[test]
    fn flush_with_nothing_pending_is_idle() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 10]).is_appended());
        assert_eq!(recorder.flush().unwrap(), FlushOutcome::Idle);
        assert_eq!(fs.open_count(), 0);
        assert_eq!(recorder.fill(SlotLabel::A), 10);
    }

    #[test]
    fn second_flush_is_a_no_op() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 100]).is_appended());

        assert!(matches!(recorder.flush().unwrap(), FlushOutcome::Written { .. }));
        let writes = fs.write_count();
        assert_eq!(recorder.flush().unwrap(), FlushOutcome::Idle);
        assert_eq!(fs.write_count(), writes);
        assert_eq!(fs.open_count(), 1);
    }

    #[test]
    fn flush_is_rejected_while_guard_is_held() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 100]).is_appended());

        let guard = FlushGuard::try_acquire(&recorder.flushing).unwrap();
        assert!(recorder.is_flushing());
        assert_eq!(recorder.flush().unwrap(), FlushOutcome::Busy);
        assert_eq!(recorder.fill(SlotLabel::A), 400);
        assert_eq!(fs.open_count(), 0);
        assert_eq!(recorder.stats().flushes_busy(), 1);

        drop(guard);
        assert!(!recorder.is_flushing());
        assert!(matches!(recorder.flush().unwrap(), FlushOutcome::Written { .. }));
    }

    #[test]
    fn failed_flush_keeps_data_and_marks_storage() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 100]).is_appended());

        fs.set_write_protected(true);
        let result = recorder.flush();
        assert!(matches!(
            result,
            Err(RecorderError::Storage(StorageError::WriteProtected))
        ));
        assert!(!recorder.storage_usable());
        assert!(!recorder.is_flushing());
        assert_eq!(recorder.fill(SlotLabel::A), 400);
        assert_eq!(recorder.stats().flush_failures(), 1);

        fs.set_write_protected(false);
        assert!(matches!(recorder.flush().unwrap(), FlushOutcome::Written { bytes: 400, .. }));
        assert_eq!(recorder.fill(SlotLabel::A), 0);
        // Sticky until the next session.
        assert!(!recorder.storage_usable());
    }

    #[test]
    fn close_drains_both_slots_in_order() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[1u8; 300]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 150]).is_appended()); // A = 450
        assert!(recorder.write_bytes(&[3u8; 60]).is_appended()); // swap, B = 60
        assert!(recorder.write_bytes(&[4u8; 40]).is_appended()); // B = 100

        let outcome = recorder.close_session().unwrap();
        assert_eq!(
            outcome,
            CloseOutcome::Closed {
                path: PathBuf::from("/beacons/0.log"),
                bytes: 550
            }
        );

        let mut expected = vec![1u8; 300];
        expected.extend_from_slice(&[2u8; 150]);
        expected.extend_from_slice(&[3u8; 60]);
        expected.extend_from_slice(&[4u8; 40]);
        assert_eq!(fs.data("/beacons/0.log").unwrap(), expected);
        assert_eq!(recorder.fill(SlotLabel::A), 0);
        assert_eq!(recorder.fill(SlotLabel::B), 0);
        assert!(!recorder.is_writing());
        assert!(recorder.session_path().is_none());
    }

    #[test]
    fn close_ignores_flush_guard() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_bytes(&[5u8; 10]).is_appended());

        let _guard = FlushGuard::try_acquire(&recorder.flushing).unwrap();
        let _ = recorder.close_session().unwrap();
        assert_eq!(fs.data("/beacons/0.log").unwrap(), vec![5u8; 10]);
    }

    #[test]
    fn close_without_session_is_noop() {
        let recorder = Recorder::new(InMemoryFs::new(), test_config()).unwrap();
        assert_eq!(recorder.close_session().unwrap(), CloseOutcome::NotOpen);

        let (_fs, recorder) = open_recorder();
        let _ = recorder.close_session().unwrap();
        assert_eq!(recorder.close_session().unwrap(), CloseOutcome::NotOpen);
    }

    #[test]
    fn reopening_starts_a_new_file() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_str("first\n").is_appended());
        let _ = recorder.close_session().unwrap();

        let path = recorder.open_session().unwrap();
        assert_eq!(path, Path::new("/beacons/1.log"));
        assert!(recorder.write_str("second\n").is_appended());
        // Opening again closes the running session first.
        let next = recorder.open_session().unwrap();
        assert_eq!(next, Path::new("/beacons/2.log"));

        assert_eq!(fs.data("/beacons/0.log").unwrap(), b"first\n");
        assert_eq!(fs.data("/beacons/1.log").unwrap(), b"second\n");
    }

    #[test]
    fn records_round_trip_through_log() {
        let (fs, recorder) = open_recorder();
        let records: Vec<_> = (0..20).map(record).collect();
        for r in &records {
            assert!(recorder.append_record(r).is_appended());
            let _ = recorder.flush().unwrap();
        }
        let _ = recorder.close_session().unwrap();

        let data = fs.data("/beacons/0.log").unwrap();
        let decoded: Vec<_> = LogLines::new(&data).collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn rotation_after_size_limit() {
        let fs = InMemoryFs::new();
        let recorder =
            Recorder::new(fs.clone(), test_config().rotate_after_bytes(300)).unwrap();
        recorder.open_session().unwrap();

        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 100]).is_appended());
        let _ = recorder.flush().unwrap();

        assert_eq!(recorder.session_path().unwrap(), Path::new("/beacons/1.log"));
        assert_eq!(recorder.stats().rotations(), 1);

        let _ = recorder.close_session().unwrap();
        assert_eq!(fs.data("/beacons/0.log").unwrap(), vec![1u8; 400]);
        assert_eq!(fs.data("/beacons/1.log").unwrap(), vec![2u8; 100]);
    }

    #[test]
    fn explicit_rotate() {
        let (fs, recorder) = open_recorder();
        assert!(recorder.write_str("a\n").is_appended());
        let path = recorder.rotate().unwrap();
        assert_eq!(path, Path::new("/beacons/1.log"));
        let _ = recorder.close_session().unwrap();

        assert!(fs.data("/beacons/1.log").is_some());
        assert!(matches!(recorder.rotate(), Err(RecorderError::NotWriting)));
    }

    #[test]
    fn persists_on_disk() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("beacons");
        let recorder = Recorder::new(
            StdFs::new(),
            test_config().folder(&folder),
        )
        .unwrap();

        let path = recorder.open_session().unwrap();
        assert_eq!(path, folder.join("0.log"));
        assert!(recorder.append_record(&record(1)).is_appended());
        let _ = recorder.close_session().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data, record(1).to_line().into_bytes());
    }

    #[test]
    fn concurrent_producer_and_flusher() {
        let fs = InMemoryFs::new();
        let recorder = Arc::new(Recorder::new(fs.clone(), test_config()).unwrap());
        recorder.open_session().unwrap();

        let producer = {
            let recorder = Arc::clone(&recorder);
            thread::spawn(move || {
                for n in 0..2_000 {
                    let _ = recorder.append_record(&record(n));
                }
            })
        };
        let flusher = {
            let recorder = Arc::clone(&recorder);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let _ = recorder.flush().unwrap();
                    thread::yield_now();
                }
            })
        };
        producer.join().unwrap();
        flusher.join().unwrap();
        let _ = recorder.close_session().unwrap();

        let data = fs.data("/beacons/0.log").unwrap_or_default();
        let stats = recorder.stats().snapshot();
        assert_eq!(data.len() as u64, stats.bytes_appended);
        assert_eq!(stats.records_appended + stats.records_dropped, 2_000);

        let decoded: Vec<_> = LogLines::new(&data).collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded.len() as u64, stats.records_appended);
        // Records that made it keep their production order.
        assert!(decoded.windows(2).all(|w| w[0].lat < w[1].lat));
    }
}

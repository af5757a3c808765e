//! Test fixtures and recorder helpers.
//!
//! Provides ready-made recorders with an open session, backed by memory or
//! by a temporary directory.

use beacon_recorder::{BeaconRecord, LogLines, RecordError, Recorder, RecorderConfig};
use beacon_storage::{InMemoryFs, LogFs, StdFs};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Slot capacity used by the fixtures.
///
/// Small enough that a few dozen records force a swap.
pub const TEST_SLOT_CAPACITY: usize = 1024;

/// Configuration used by the fixtures, rooted at `folder`.
pub fn test_config(folder: impl Into<PathBuf>) -> RecorderConfig {
    RecorderConfig::new()
        .folder(folder)
        .slot_capacity(TEST_SLOT_CAPACITY)
}

/// A recorder with an open session and automatic cleanup.
pub struct TestRecorder<F: LogFs> {
    /// The recorder.
    pub recorder: Recorder<F>,
    /// The filesystem handle shared with the recorder.
    pub fs: F,
    /// Path of the open session's file.
    pub path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestRecorder<InMemoryFs> {
    /// Creates an in-memory recorder logging to `/beacons`.
    pub fn memory() -> Self {
        Self::memory_with(test_config("/beacons"))
    }

    /// Creates an in-memory recorder with a custom configuration.
    pub fn memory_with(config: RecorderConfig) -> Self {
        Self::open(InMemoryFs::new(), config, None)
    }

    /// Returns the bytes written to the session file so far.
    pub fn contents(&self) -> Vec<u8> {
        self.fs.data(&self.path).unwrap_or_default()
    }
}

impl TestRecorder<StdFs> {
    /// Creates a recorder logging to a fresh temporary directory.
    pub fn on_disk() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = test_config(temp_dir.path().join("beacons"));
        Self::open(StdFs::new(), config, Some(temp_dir))
    }

    /// Returns the bytes written to the session file so far.
    pub fn contents(&self) -> Vec<u8> {
        std::fs::read(&self.path).unwrap_or_default()
    }
}

impl<F: LogFs + Clone> TestRecorder<F> {
    fn open(fs: F, config: RecorderConfig, temp_dir: Option<TempDir>) -> Self {
        let recorder = Recorder::new(fs.clone(), config).expect("Failed to create recorder");
        let path = recorder.open_session().expect("Failed to open session");
        Self {
            recorder,
            fs,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the log folder.
    pub fn folder(&self) -> &Path {
        &self.recorder.config().folder
    }
}

impl<F: LogFs> std::ops::Deref for TestRecorder<F> {
    type Target = Recorder<F>;

    fn deref(&self) -> &Self::Target {
        &self.recorder
    }
}

/// Runs a test with an in-memory recorder.
///
/// # Example
///
/// ```rust
/// use beacon_recorder::BeaconRecord;
/// use beacon_testkit::with_memory_recorder;
///
/// with_memory_recorder(|recorder, fs| {
///     assert!(recorder.append_record(&BeaconRecord::default()).is_appended());
///     let _ = recorder.close_session().unwrap();
///     assert_eq!(fs.files().len(), 1);
/// });
/// ```
pub fn with_memory_recorder<T, R>(test: T) -> R
where
    T: FnOnce(&Recorder<InMemoryFs>, &InMemoryFs) -> R,
{
    let fixture = TestRecorder::memory();
    test(&fixture.recorder, &fixture.fs)
}

/// Runs a test with a recorder writing to a temporary directory.
pub fn with_disk_recorder<T, R>(test: T) -> R
where
    T: FnOnce(&Recorder<StdFs>, &Path) -> R,
{
    let fixture = TestRecorder::on_disk();
    test(&fixture.recorder, &fixture.path)
}

/// Decodes every line of a log file.
pub fn read_records(data: &[u8]) -> Result<Vec<BeaconRecord>, RecordError> {
    LogLines::new(data).collect()
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use beacon_recorder::{AnsiId, FrameId};

    /// Creates a record tagged with `source` and a sequence number.
    ///
    /// `source` ends up in the frame identifier and `sequence` in the
    /// timestamps, so producers can be told apart after decoding.
    pub fn tagged_record(source: usize, sequence: u32) -> BeaconRecord {
        BeaconRecord {
            frame_id: FrameId::new(&format!("P{source}")).expect("valid frame id"),
            ansi_id: AnsiId::new("1581F5FJD22410000000").expect("valid ansi id"),
            lat: 48_856_613 + sequence as i32,
            lon: 2_352_222,
            alt: 120,
            height: 45,
            lat_start: 48_856_613,
            lon_start: 2_352_222,
            speed: 12,
            bearing: 270,
            last_seen: u64::from(sequence),
            first_seen: 0,
        }
    }

    /// Fills the active slot until the next record would trigger a swap.
    ///
    /// Returns the number of records appended.
    pub fn fill_active_slot<F: LogFs>(recorder: &Recorder<F>) -> usize {
        let record = tagged_record(0, 0);
        let len = record.to_line().len();
        let config = recorder.config();
        let active = recorder.active_slot();

        let mut count = 0;
        while recorder.fill(active) + len + config.reserve_margin < config.slot_capacity {
            if !recorder.append_record(&record).is_appended() {
                break;
            }
            count += 1;
        }
        count
    }
}

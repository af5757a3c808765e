//! Periodic flushing on a background thread.
//!
//! On the target device the flush path runs from a timer interrupt. On a
//! host the same role is played by a thread that calls
//! [`Recorder::flush`] at a fixed interval:
//!
//! ```rust
//! use beacon_recorder::{PeriodicFlusher, Recorder, RecorderConfig};
//! use beacon_storage::InMemoryFs;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let recorder = Arc::new(Recorder::new(InMemoryFs::new(), RecorderConfig::new()).unwrap());
//! recorder.open_session().unwrap();
//!
//! let flusher = PeriodicFlusher::spawn(Arc::clone(&recorder), Duration::from_millis(5)).unwrap();
//! // ... producers append records ...
//! flusher.stop();
//! let _ = recorder.close_session().unwrap();
//! ```

use crate::recorder::{FlushOutcome, Recorder};
use beacon_storage::LogFs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// A background thread that flushes a [`Recorder`] at a fixed interval.
///
/// Flush errors are logged and the thread keeps running, so a medium that
/// comes back is picked up by the next tick. Call [`PeriodicFlusher::stop`]
/// to join the thread; dropping the handle stops it as well.
#[derive(Debug)]
pub struct PeriodicFlusher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicFlusher {
    /// Starts flushing `recorder` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<F>(recorder: Arc<Recorder<F>>, interval: Duration) -> io::Result<Self>
    where
        F: LogFs + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("beacon-flush".into())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "flush thread started");
                while !flag.load(Ordering::Acquire) {
                    thread::park_timeout(interval);
                    if flag.load(Ordering::Acquire) {
                        break;
                    }
                    match recorder.flush() {
                        Ok(FlushOutcome::Written { .. } | FlushOutcome::Idle) => {}
                        Ok(FlushOutcome::Busy) => debug!("flush skipped, previous flush running"),
                        Err(e) => warn!(error = %e, "periodic flush failed"),
                    }
                }
                debug!("flush thread stopped");
            })?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Returns true while the thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the thread and waits for it to exit.
    ///
    /// A flush that is in progress completes first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.thread().unpark();
            if thread.join().is_err() {
                warn!("flush thread panicked");
            }
        }
    }
}

impl Drop for PeriodicFlusher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecorderConfig;
    use crate::slot::SlotLabel;
    use beacon_storage::InMemoryFs;
    use std::time::Instant;

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn flushes_pending_slot_in_background() {
        let fs = InMemoryFs::new();
        let config = RecorderConfig::new()
            .slot_capacity(512)
            .reserve_margin(16);
        let recorder = Arc::new(Recorder::new(fs.clone(), config).unwrap());
        recorder.open_session().unwrap();

        assert!(recorder.write_bytes(&[1u8; 400]).is_appended());
        assert!(recorder.write_bytes(&[2u8; 100]).is_appended()); // swap

        let flusher =
            PeriodicFlusher::spawn(Arc::clone(&recorder), Duration::from_millis(1)).unwrap();
        assert!(wait_until(Duration::from_secs(5), || {
            recorder.fill(SlotLabel::A) == 0
        }));
        flusher.stop();

        assert_eq!(fs.data("/beacons/0.log").unwrap(), vec![1u8; 400]);
        assert_eq!(recorder.fill(SlotLabel::B), 100);
    }

    #[test]
    fn stop_joins_thread() {
        let recorder = Arc::new(Recorder::new(InMemoryFs::new(), RecorderConfig::new()).unwrap());
        let flusher =
            PeriodicFlusher::spawn(Arc::clone(&recorder), Duration::from_secs(3600)).unwrap();
        assert!(flusher.is_running());

        let start = Instant::now();
        flusher.stop();
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(Arc::strong_count(&recorder), 1);
    }

    #[test]
    fn drop_stops_thread() {
        let recorder = Arc::new(Recorder::new(InMemoryFs::new(), RecorderConfig::new()).unwrap());
        {
            let _flusher =
                PeriodicFlusher::spawn(Arc::clone(&recorder), Duration::from_secs(3600)).unwrap();
        }
        assert_eq!(Arc::strong_count(&recorder), 1);
    }
}

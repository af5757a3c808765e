//! 64-bit microsecond timestamps from a wrapping 32-bit counter.
//!
//! Hardware timers commonly expose a free-running 32-bit microsecond counter
//! that wraps after about 71 minutes. [`WideClock`] extends it to 64 bits by
//! counting wraparounds: whenever a reading is lower than the previous one,
//! exactly one wrap is assumed. The clock must therefore be read at least
//! once per wrap period; longer gaps lose wraps silently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A free-running 32-bit microsecond counter.
pub trait Clock32: Send + Sync {
    /// Returns the current counter value.
    fn now_micros32(&self) -> u32;
}

impl<F> Clock32 for F
where
    F: Fn() -> u32 + Send + Sync,
{
    fn now_micros32(&self) -> u32 {
        self()
    }
}

/// The host's monotonic clock, truncated to a wrapping 32-bit counter.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock32 {
    origin: Instant,
}

impl SystemClock32 {
    /// Creates a counter that starts at zero now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock32 for SystemClock32 {
    fn now_micros32(&self) -> u32 {
        // Truncation is the point: this models the hardware counter.
        self.origin.elapsed().as_micros() as u32
    }
}

const LOW_MASK: u64 = 0xFFFF_FFFF;

/// Extends a [`Clock32`] to a monotonically increasing 64-bit counter.
///
/// The last returned value is kept in one atomic word (high word = wrap
/// count, low word = previous reading), so the clock can be shared between
/// execution contexts without a lock.
///
/// ```rust
/// use beacon_recorder::WideClock;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let raw = Arc::new(AtomicU32::new(0xFFFF_FFF0));
/// let source = Arc::clone(&raw);
/// let clock = WideClock::new(move || source.load(Ordering::SeqCst));
///
/// assert_eq!(clock.micros64(), 0xFFFF_FFF0);
/// raw.store(5, Ordering::SeqCst);
/// assert_eq!(clock.micros64(), 0x1_0000_0005);
/// ```
#[derive(Debug)]
pub struct WideClock<C> {
    source: C,
    last: AtomicU64,
}

impl<C: Clock32> WideClock<C> {
    /// Wraps `source`. The wrap count starts at zero.
    pub fn new(source: C) -> Self {
        Self {
            source,
            last: AtomicU64::new(0),
        }
    }

    /// Returns the current time in microseconds as a 64-bit value.
    pub fn micros64(&self) -> u64 {
        let mut now = 0;
        // The source is read inside the update so a racing caller that
        // published a later reading forces a fresh read instead of a
        // spurious wrap.
        let _ = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                let low = u64::from(self.source.now_micros32());
                let mut high = last & !LOW_MASK;
                if low < last & LOW_MASK {
                    high = high.wrapping_add(1 << 32);
                }
                now = high | low;
                Some(now)
            });
        now
    }

    /// Returns the wrapped source.
    pub fn source(&self) -> &C {
        &self.source
    }
}

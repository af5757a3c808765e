//! Fixed-capacity byte slots.
//!
//! A slot is allocated once and never grows. Its bytes sit behind a mutex
//! that is held only for a memory copy by producers, or for the duration of
//! a file write by the flush path. The fill length is mirrored in an atomic
//! so the other side can check emptiness without taking the lock.

use crate::error::{RecorderError, RecorderResult};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Names one of the two slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotLabel {
    /// The slot selected when a session opens.
    A,
    /// The alternate slot.
    B,
}

impl SlotLabel {
    /// Returns the other slot.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// A fixed-capacity byte region with a fill length.
///
/// # Invariants
///
/// - `len() <= capacity()` at every observation point
/// - the backing buffer is allocated in [`Slot::allocate`] and never resized
#[derive(Debug)]
pub struct Slot {
    label: SlotLabel,
    data: Mutex<Vec<u8>>,
    len: AtomicUsize,
    capacity: usize,
}

impl Slot {
    /// Allocates a zeroed slot of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RecorderError::Allocation`] if the memory is not available.
    pub fn allocate(label: SlotLabel, capacity: usize) -> RecorderResult<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| RecorderError::Allocation {
                slot: label,
                bytes: capacity,
            })?;
        data.resize(capacity, 0);

        Ok(Self {
            label,
            data: Mutex::new(data),
            len: AtomicUsize::new(0),
            capacity,
        })
    }

    /// Returns which slot this is.
    #[must_use]
    pub fn label(&self) -> SlotLabel {
        self.label
    }

    /// Returns the capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the current fill length without locking.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns true if the slot holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks the slot for reading or writing its bytes.
    pub fn lock(&self) -> SlotGuard<'_> {
        SlotGuard {
            slot: self,
            data: self.data.lock(),
        }
    }
}

/// Exclusive access to a slot's bytes.
pub struct SlotGuard<'a> {
    slot: &'a Slot,
    data: MutexGuard<'a, Vec<u8>>,
}

impl SlotGuard<'_> {
    /// Returns the current fill length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slot.len.load(Ordering::Acquire)
    }

    /// Returns true if the slot holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the free space in bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.slot.capacity - self.len()
    }

    /// Appends `bytes`. Returns false, leaving the slot untouched, if they
    /// do not fit.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        let start = self.len();
        let end = start + bytes.len();
        if end > self.slot.capacity {
            return false;
        }
        self.data[start..end].copy_from_slice(bytes);
        self.slot.len.store(end, Ordering::Release);
        true
    }

    /// Returns the filled part of the slot.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    /// Empties the slot.
    pub fn reset(&mut self) {
        self.slot.len.store(0, Ordering::Release);
    }
}

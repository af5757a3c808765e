//! # Beacon Testkit
//!
//! Test utilities for the beacon log recorder.
//!
//! This crate provides:
//! - Recorder fixtures backed by memory or a temporary directory
//! - A fault-injecting filesystem wrapper
//! - Property-based test generators using proptest
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use beacon_testkit::prelude::*;
//!
//! let fixture = TestRecorder::memory();
//! assert!(fixture.append_record(&scenarios::tagged_record(0, 1)).is_appended());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;

//! Benchmark helpers for the beacon log recorder.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;

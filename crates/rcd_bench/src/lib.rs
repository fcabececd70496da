//! Benchmark utilities for the RCD master-data store.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;

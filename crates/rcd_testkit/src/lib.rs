//! # RCD Testkit
//!
//! Test utilities for the RCD master-data store.
//!
//! This crate provides:
//! - Test fixtures wrapping a document service over a temporary index
//! - Sample data sets used across the integration tests
//! - Stores that fail or pause while a rebuild reads them
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rcd_testkit::prelude::*;
//!
//! #[test]
//! fn closed_dictionaries_are_hidden() {
//!     let index = TestService::synced(scenarios::alpha_beta_gamma());
//!     let page = index.find_by_criteria(&FilterCriteria::new()).unwrap();
//!     assert_eq!(page.items.len(), 2);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stores;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stores::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stores::*;

//! CLI command implementations.

pub mod query;
pub mod rebuild;
pub mod stats;
pub mod verify;

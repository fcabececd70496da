//! # RCD Index
//!
//! Indexed document store of the RCD master-data store.
//!
//! Every entity type lives in the authoritative store and is mirrored into
//! one search index, derived from it and rebuildable from it at any time.
//!
//! This crate provides:
//! - The schema registry, turning static index metadata into an indexed layout
//! - The document binder, encoding entities into index documents and back
//! - The criteria compiler, turning [`FilterCriteria`](rcd_model::FilterCriteria)
//!   into native queries with sort and activity filtering
//! - The index lifecycle manager: one shared writer, snapshot readers and
//!   generation-swapping rebuilds
//! - The document service, rebuild coordinator and uniqueness scanner
//!
//! ## Example
//!
//! ```rust,ignore
//! use rcd_index::{DocumentService, IndexConfig, SchemaRegistry};
//! use rcd_model::{Dictionary, FilterCriteria};
//!
//! let registry = SchemaRegistry::new();
//! let service = DocumentService::<Dictionary>::open(&registry, IndexConfig::new("index"), store)?;
//! if service.is_corrupted()? {
//!     service.execute_rebuild()?;
//! }
//! let page = service.find_by_criteria(&FilterCriteria::new())?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod binder;
mod config;
pub mod criteria;
pub mod dir;
mod error;
pub mod events;
mod lifecycle;
pub mod rebuild;
pub mod schema;
pub mod search;
mod service;
mod stats;
pub mod unique;

pub use binder::DocumentBinder;
pub use config::{IndexConfig, MIN_WRITER_HEAP_BYTES};
pub use criteria::{CompiledCriteria, CriteriaCompiler};
pub use error::{IndexError, IndexResult};
pub use events::{EventBus, IndexEvent};
pub use lifecycle::{Change, IndexManager, IndexState, IndexWriterGuard, RebuildWriter};
pub use rebuild::{
    CancellationToken, RebuildCoordinator, RebuildDescriptor, RebuildRequest, RebuildStatus,
    RebuildSummary, RebuildUnit,
};
pub use schema::{SchemaDescriptor, SchemaRegistry};
pub use service::{DocumentService, IndexTransaction};
pub use stats::{IndexStats, IndexStatsSnapshot};
pub use unique::UniquenessScanner;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # RCD Storage
//!
//! The authoritative store is the source of truth for every entity. The
//! search index is derived from it and can always be rebuilt from it.
//!
//! ## Design Principles
//!
//! - The index layer only reads from the store (`total_count`, `get_all`,
//!   `iterate_all`)
//! - Writes go through the concrete store types, owned by the service layer
//! - Stores must be `Send + Sync` for concurrent access
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral data
//! - [`JsonLinesStore`] - One JSON document per line in a single file
//!
//! ## Example
//!
//! ```rust
//! use rcd_model::Group;
//! use rcd_storage::{AuthoritativeStore, InMemoryStore};
//!
//! let store = InMemoryStore::new();
//! store.put(Group::new("geo"));
//! assert_eq!(store.total_count().unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::JsonLinesStore;
pub use memory::InMemoryStore;
pub use store::{AuthoritativeStore, PageIter, Pages};

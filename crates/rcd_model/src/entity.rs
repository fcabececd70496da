//! Entity capabilities.
//!
//! Entities are plain structs that opt into capabilities by implementing a
//! small set of traits. The index layer depends only on the capability it
//! needs, never on a concrete entity type.

use crate::change::{ChangeType, History};
use uuid::Uuid;

/// Generates a new random entity identifier.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// An entity addressable by a primary key.
pub trait Entity {
    /// Returns the primary key.
    fn id(&self) -> &str;
}

/// An entity with soft-versioned history.
pub trait Versioned: Entity {
    /// Returns the history record.
    fn history(&self) -> &History;

    /// Returns the history record for modification.
    fn history_mut(&mut self) -> &mut History;

    /// Returns the last change type.
    fn change_type(&self) -> ChangeType {
        self.history().change_type
    }

    /// Returns true unless the entity has been closed.
    fn is_active(&self) -> bool {
        self.change_type() != ChangeType::Close
    }

    /// Marks the entity as closed.
    fn close(&mut self) {
        self.history_mut().touch(ChangeType::Close);
    }
}

/// An entity with a human readable name.
pub trait Named {
    /// Returns the name.
    fn name(&self) -> &str;
}

/// An entity that belongs to a parent entity.
pub trait Relation {
    /// Logical name of the indexed field holding the parent id.
    const RELATION_FIELD: &'static str;

    /// Returns the parent id.
    fn related_id(&self) -> &str;
}

//! Index rebuild from the authoritative store.
//!
//! Every indexed entity type is a [`RebuildUnit`]. The
//! [`RebuildCoordinator`] runs units one at a time in priority order, so
//! that referenced types are rebuilt before the types referring to them.

mod coordinator;

pub use coordinator::RebuildCoordinator;

use crate::error::IndexResult;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Priority of entity types without a declared one. Rebuilt last.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Returns the rebuild priority of an entity type. Lower runs first.
#[must_use]
pub fn default_priority(entity_type: &str) -> i32 {
    match entity_type {
        "Group" => 0,
        "Dictionary" => 10,
        "MetaField" => 20,
        "Field" => 30,
        "RecodeRuleSet" => 40,
        "RecodeRule" => 50,
        "Record" => 60,
        _ => DEFAULT_PRIORITY,
    }
}

/// One rebuildable index.
pub trait RebuildUnit: Send + Sync {
    /// Returns the stable entity type name.
    fn name(&self) -> &str;

    /// Returns the rebuild priority. Lower runs first.
    fn priority(&self) -> i32;

    /// Returns true if the index and the authoritative store disagree on
    /// the number of documents.
    ///
    /// # Errors
    ///
    /// Returns the failure of either count.
    fn is_corrupted(&self) -> IndexResult<bool>;

    /// Returns the number of entities in the authoritative store.
    ///
    /// # Errors
    ///
    /// Returns the storage failure.
    fn total_document_count(&self) -> IndexResult<usize>;

    /// Rebuilds the index and returns its new document count.
    ///
    /// # Errors
    ///
    /// Returns the failure. The previous index content stays visible.
    fn execute_rebuild(&self) -> IndexResult<usize>;
}

/// Outcome of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RebuildStatus {
    /// The index was intact and not forced.
    Skipped,
    /// The index was rebuilt.
    Finished,
    /// The check or the rebuild failed.
    Error,
    /// Cancellation was requested before the unit started.
    Canceled,
}

impl fmt::Display for RebuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebuildStatus::Skipped => "SKIPPED",
            RebuildStatus::Finished => "FINISHED",
            RebuildStatus::Error => "ERROR",
            RebuildStatus::Canceled => "CANCELED",
        };
        f.write_str(name)
    }
}

/// Report of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildDescriptor {
    /// The entity type.
    pub entity_type: String,
    /// The outcome.
    pub status: RebuildStatus,
    /// Documents of the new generation, zero unless finished.
    pub document_count: usize,
    /// Failure message of an `Error` outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RebuildDescriptor {
    pub(crate) fn new(entity_type: &str, status: RebuildStatus) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            status,
            document_count: 0,
            error: None,
        }
    }

    pub(crate) fn finished(entity_type: &str, document_count: usize) -> Self {
        Self {
            document_count,
            ..Self::new(entity_type, RebuildStatus::Finished)
        }
    }

    pub(crate) fn failed(entity_type: &str, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(entity_type, RebuildStatus::Error)
        }
    }
}

/// What to rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildRequest {
    /// Entity types to consider, `None` for every registered unit.
    pub targets: Option<Vec<String>>,
    /// Rebuild intact indexes too.
    pub force: bool,
}

impl RebuildRequest {
    /// Requests every corrupted index.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the request to `targets`.
    #[must_use]
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = Some(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Sets whether intact indexes are rebuilt too.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Overall report of one coordinator run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    /// One descriptor per unit, in execution order.
    pub units: Vec<RebuildDescriptor>,
    /// Units rebuilt.
    pub finished: usize,
    /// Units intact and skipped.
    pub skipped: usize,
    /// Units failed.
    pub errors: usize,
    /// Units not started because of cancellation.
    pub cancelled: usize,
}

impl RebuildSummary {
    pub(crate) fn push(&mut self, descriptor: RebuildDescriptor) {
        match descriptor.status {
            RebuildStatus::Finished => self.finished += 1,
            RebuildStatus::Skipped => self.skipped += 1,
            RebuildStatus::Error => self.errors += 1,
            RebuildStatus::Canceled => self.cancelled += 1,
        }
        self.units.push(descriptor);
    }

    /// Returns true if no unit failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors == 0
    }

    /// Returns the descriptor of `entity_type`.
    #[must_use]
    pub fn unit(&self, entity_type: &str) -> Option<&RebuildDescriptor> {
        self.units.iter().find(|unit| unit.entity_type == entity_type)
    }
}

/// Cooperative cancellation shared between a coordinator run and its
/// requester. Checked between units.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

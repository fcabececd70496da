//! Criteria compiler.
//!
//! Turns a [`FilterCriteria`](rcd_model::FilterCriteria) into a native
//! boolean query, a sort specification and a separate visibility filter
//! over the change type.
//!
//! # Query Structure
//!
//! Filters are folded left to right, each against everything compiled
//! before it:
//!
//! ```text
//! a AND b OR c NOT d   =>   (((a AND b) OR c) AND NOT d)
//! ```
//!
//! The free-text block (one prefix clause per word, all required) is folded
//! last with the search condition. The activity filter is never part of
//! the folded query.

mod compiler;
pub mod dates;

pub use compiler::CriteriaCompiler;

use rcd_model::ValueKind;
use std::fmt;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query};
use tantivy::schema::Field;

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Logical field name.
    pub name: String,
    /// Physical field.
    pub field: Field,
    /// Value kind, which decides the comparison.
    pub kind: ValueKind,
    /// True for descending order.
    pub descending: bool,
}

/// Sort specification: keys compared in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeSort {
    /// Sort keys, most significant first.
    pub keys: Vec<SortKey>,
}

impl NativeSort {
    /// Returns the logical names of the sort keys.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| key.name.as_str())
    }
}

/// Result of compiling criteria.
pub struct CompiledCriteria {
    /// Business filters and free text.
    pub query: Box<dyn Query>,
    /// Sort specification.
    pub sort: NativeSort,
    /// Visibility filter, `None` when everything is visible.
    pub activity: Option<Box<dyn Query>>,
}

impl CompiledCriteria {
    /// Returns the query to execute: the business query restricted by the
    /// activity filter. The filter does not contribute to scoring.
    #[must_use]
    pub fn executable(&self) -> Box<dyn Query> {
        match &self.activity {
            None => self.query.box_clone(),
            Some(activity) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, self.query.box_clone()),
                (
                    Occur::Must,
                    Box::new(ConstScoreQuery::new(activity.box_clone(), 0.0)),
                ),
            ])),
        }
    }
}

impl fmt::Debug for CompiledCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCriteria")
            .field("query", &self.query)
            .field("sort", &self.sort)
            .field("activity", &self.activity)
            .finish()
    }
}

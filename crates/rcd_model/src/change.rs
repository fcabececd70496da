//! Change types and soft-versioned history.
//!
//! Entities are never physically removed from the master-data store. Every
//! versioned entity carries a [`History`] that records the last change
//! applied to it; closing an entity sets its change type to
//! [`ChangeType::Close`].

use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of the last change applied to a versioned entity.
///
/// The declaration order is significant: it is the order used by
/// [`ChangeTypeSet`] iteration and by sorting on the change-type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    /// Change was ignored by an import.
    Ignore,
    /// Change was skipped by an import.
    Skip,
    /// Entity was created.
    Create,
    /// Entity was updated.
    Update,
    /// Entity was restored after being closed.
    Restore,
    /// Entity was closed (soft-deleted).
    Close,
}

impl ChangeType {
    /// All change types in declaration order.
    pub const ALL: [ChangeType; 6] = [
        ChangeType::Ignore,
        ChangeType::Skip,
        ChangeType::Create,
        ChangeType::Update,
        ChangeType::Restore,
        ChangeType::Close,
    ];

    /// Returns the stable name stored in the index.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ChangeType::Ignore => "IGNORE",
            ChangeType::Skip => "SKIP",
            ChangeType::Create => "CREATE",
            ChangeType::Update => "UPDATE",
            ChangeType::Restore => "RESTORE",
            ChangeType::Close => "CLOSE",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChangeType {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        ChangeType::ALL
            .into_iter()
            .find(|change_type| change_type.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownChangeType(s.to_string()))
    }
}

/// A compact set of change types.
///
/// Iteration yields members in [`ChangeType`] declaration order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeTypeSet(u8);

impl ChangeTypeSet {
    /// The empty set.
    pub const EMPTY: ChangeTypeSet = ChangeTypeSet(0);

    /// Every change type.
    pub const ALL: ChangeTypeSet = ChangeTypeSet(0b11_1111);

    /// Creates a set from a slice of change types.
    #[must_use]
    pub const fn of(types: &[ChangeType]) -> Self {
        let mut bits = 0u8;
        let mut i = 0;
        while i < types.len() {
            bits |= types[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Returns a copy of this set with `change_type` added.
    #[must_use]
    pub const fn with(self, change_type: ChangeType) -> Self {
        Self(self.0 | change_type.bit())
    }

    /// Returns true if the set contains `change_type`.
    #[must_use]
    pub const fn contains(self, change_type: ChangeType) -> bool {
        self.0 & change_type.bit() != 0
    }

    /// Returns true if the set holds every change type.
    #[must_use]
    pub const fn is_all(self) -> bool {
        self.0 == Self::ALL.0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the number of members.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates members in declaration order.
    pub fn iter(self) -> impl Iterator<Item = ChangeType> {
        ChangeType::ALL
            .into_iter()
            .filter(move |change_type| self.contains(*change_type))
    }
}

impl fmt::Debug for ChangeTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<ChangeType> for ChangeTypeSet {
    fn from_iter<I: IntoIterator<Item = ChangeType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl Serialize for ChangeTypeSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ChangeTypeSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let types = Vec::<ChangeType>::deserialize(deserializer)?;
        Ok(types.into_iter().collect())
    }
}

/// Soft-versioned history carried by every versioned entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    /// Identifier shared by all versions of the same logical entity.
    pub history_id: String,
    /// Last change applied.
    pub change_type: ChangeType,
    /// When the last change was applied.
    pub change_date: DateTime<Utc>,
}

impl History {
    /// Creates a history for a freshly created entity.
    #[must_use]
    pub fn created() -> Self {
        Self {
            history_id: crate::entity::new_id(),
            change_type: ChangeType::Create,
            change_date: Utc::now(),
        }
    }

    /// Creates a history with explicit values.
    #[must_use]
    pub fn new(history_id: impl Into<String>, change_type: ChangeType, change_date: DateTime<Utc>) -> Self {
        Self {
            history_id: history_id.into(),
            change_type,
            change_date,
        }
    }

    /// Records a change at the current time.
    pub fn touch(&mut self, change_type: ChangeType) {
        self.change_type = change_type;
        self.change_date = Utc::now();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::created()
    }
}

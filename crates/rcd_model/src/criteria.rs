//! Filter criteria model.
//!
//! [`FilterCriteria`] is the generic, serializable description of a
//! filter/sort/search request accepted from the service layer. It is pure
//! data: compiling it into a native query is the job of the index layer.
//!
//! # JSON Form
//!
//! ```json
//! {
//!   "sortOrderKey": "name",
//!   "sortOrderValue": "DESC",
//!   "offset": 0,
//!   "count": 25,
//!   "search": "alp",
//!   "searchCondition": "AND",
//!   "filters": {
//!     "groupId": { "type": "StringEq", "value": "g-1" },
//!     "version": { "type": "Empty", "condition": "NOT" }
//!   },
//!   "activity": "ALL"
//! }
//! ```
//!
//! Filters are folded left to right in the order they were inserted, which
//! for JSON input is document order.

use crate::change::{ChangeType, ChangeTypeSet};
use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Default page size.
pub const COUNT_DEFAULT: i32 = 100;

/// Page size meaning "no limit".
pub const COUNT_ALL: i32 = -1;

/// How a clause combines with its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    /// Both must match.
    #[default]
    And,
    /// Either may match.
    Or,
    /// The clause must not match.
    Not,
}

impl Condition {
    const fn or() -> Self {
        Condition::Or
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Returns true for descending order.
    #[must_use]
    pub const fn is_descending(self) -> bool {
        matches!(self, SortOrder::Desc)
    }
}

/// A typed filter on one field.
///
/// Every variant carries the outer `condition` combining it with the
/// previously folded filters. Set variants additionally carry an `inner`
/// condition combining their own values, `OR` unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FilterValue {
    /// Field has no value.
    Empty {
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
    /// Field has a value.
    NotEmpty {
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
    /// Field equals a boolean literal.
    Boolean {
        /// The literal.
        value: bool,
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
    /// Field equals one (or all) of the enum names.
    EnumSet {
        /// Enum names.
        values: Vec<String>,
        /// How the values combine.
        #[serde(rename = "innerCondition", default = "Condition::or")]
        inner: Condition,
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
    /// Field equals one (or all) of the strings. Blank strings mean `Empty`.
    StringSet {
        /// Candidate strings.
        values: Vec<String>,
        /// How the values combine.
        #[serde(rename = "innerCondition", default = "Condition::or")]
        inner: Condition,
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
    /// Field equals the string. A blank string means `Empty`.
    StringEq {
        /// The string.
        value: String,
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
    /// Field falls within whole days `start..=end`. A missing bound is open.
    DateRange {
        /// First day.
        start: Option<DateTime<Utc>>,
        /// Last day.
        end: Option<DateTime<Utc>>,
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
    /// A nested group of filters.
    Clause {
        /// Nested filters.
        filters: Filters,
        /// Outer condition.
        #[serde(default)]
        condition: Condition,
    },
}

impl FilterValue {
    /// Field has no value.
    #[must_use]
    pub const fn empty() -> Self {
        FilterValue::Empty {
            condition: Condition::And,
        }
    }

    /// Field has a value.
    #[must_use]
    pub const fn not_empty() -> Self {
        FilterValue::NotEmpty {
            condition: Condition::And,
        }
    }

    /// Field equals `value`.
    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        FilterValue::Boolean {
            value,
            condition: Condition::And,
        }
    }

    /// Field equals any of the enum names.
    pub fn enum_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::EnumSet {
            values: values.into_iter().map(Into::into).collect(),
            inner: Condition::Or,
            condition: Condition::And,
        }
    }

    /// Field equals any of the strings.
    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::StringSet {
            values: values.into_iter().map(Into::into).collect(),
            inner: Condition::Or,
            condition: Condition::And,
        }
    }

    /// Field equals `value`.
    pub fn string_eq(value: impl Into<String>) -> Self {
        FilterValue::StringEq {
            value: value.into(),
            condition: Condition::And,
        }
    }

    /// Field falls within whole days `start..=end`.
    #[must_use]
    pub const fn date_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        FilterValue::DateRange {
            start,
            end,
            condition: Condition::And,
        }
    }

    /// A nested group of filters.
    #[must_use]
    pub fn clause(filters: Filters) -> Self {
        FilterValue::Clause {
            filters,
            condition: Condition::And,
        }
    }

    /// Returns the outer condition.
    #[must_use]
    pub const fn condition(&self) -> Condition {
        match self {
            FilterValue::Empty { condition }
            | FilterValue::NotEmpty { condition }
            | FilterValue::Boolean { condition, .. }
            | FilterValue::EnumSet { condition, .. }
            | FilterValue::StringSet { condition, .. }
            | FilterValue::StringEq { condition, .. }
            | FilterValue::DateRange { condition, .. }
            | FilterValue::Clause { condition, .. } => *condition,
        }
    }

    /// Replaces the outer condition.
    #[must_use]
    pub fn with_condition(mut self, value: Condition) -> Self {
        match &mut self {
            FilterValue::Empty { condition }
            | FilterValue::NotEmpty { condition }
            | FilterValue::Boolean { condition, .. }
            | FilterValue::EnumSet { condition, .. }
            | FilterValue::StringSet { condition, .. }
            | FilterValue::StringEq { condition, .. }
            | FilterValue::DateRange { condition, .. }
            | FilterValue::Clause { condition, .. } => *condition = value,
        }
        self
    }

    /// Replaces the inner condition of set filters. Other filters are unchanged.
    #[must_use]
    pub fn with_inner(mut self, value: Condition) -> Self {
        if let FilterValue::EnumSet { inner, .. } | FilterValue::StringSet { inner, .. } = &mut self
        {
            *inner = value;
        }
        self
    }
}

/// Filters keyed by logical field name, in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filters(Vec<(String, FilterValue)>);

impl Filters {
    /// Creates an empty filter map.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Sets the filter of `field`. Replacing keeps the original position.
    pub fn insert(&mut self, field: impl Into<String>, value: FilterValue) -> Option<FilterValue> {
        let field = field.into();
        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((field, value));
                None
            }
        }
    }

    /// Returns the filter of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FilterValue> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Removes the filter of `field`.
    pub fn remove(&mut self, field: &str) -> Option<FilterValue> {
        let position = self.0.iter().position(|(name, _)| name == field)?;
        Some(self.0.remove(position).1)
    }

    /// Returns the number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates filters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, FilterValue)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, FilterValue)>>(iter: I) -> Self {
        let mut filters = Filters::new();
        for (field, value) in iter {
            filters.insert(field, value);
        }
        filters
    }
}

impl Serialize for Filters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, value) in &self.0 {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Filters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FiltersVisitor;

        impl<'de> Visitor<'de> for FiltersVisitor {
            type Value = Filters;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to filters")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Filters, A::Error> {
                let mut filters = Filters::new();
                while let Some((field, value)) = access.next_entry::<String, FilterValue>()? {
                    filters.insert(field, value);
                }
                Ok(filters)
            }
        }

        deserializer.deserialize_map(FiltersVisitor)
    }
}

/// Visibility filter over the change type of versioned entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ActivityRepr")]
pub struct ActivityFilter {
    /// Allowed change types.
    pub change_types: ChangeTypeSet,
    /// How the change types combine.
    pub condition: Condition,
}

impl ActivityFilter {
    /// Every change type. Applies no filtering.
    pub const ALL: ActivityFilter = ActivityFilter {
        change_types: ChangeTypeSet::ALL,
        condition: Condition::Or,
    };

    /// Live entities: created, updated or restored.
    pub const ACTUAL: ActivityFilter = ActivityFilter {
        change_types: ChangeTypeSet::of(&[ChangeType::Create, ChangeType::Update, ChangeType::Restore]),
        condition: Condition::Or,
    };

    /// Closed (soft-deleted) entities only.
    pub const CLOSED: ActivityFilter = ActivityFilter {
        change_types: ChangeTypeSet::of(&[ChangeType::Close]),
        condition: Condition::And,
    };

    /// Creates a filter over `change_types`.
    #[must_use]
    pub const fn new(change_types: ChangeTypeSet, condition: Condition) -> Self {
        Self {
            change_types,
            condition,
        }
    }

    /// Returns true if the filter lets everything through.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        let mut i = 0;
        while i < ChangeType::ALL.len() {
            if !self.admits(ChangeType::ALL[i]) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Returns the admitted change types.
    pub fn admitted(&self) -> impl Iterator<Item = ChangeType> + '_ {
        ChangeType::ALL
            .into_iter()
            .filter(|change_type| self.admits(*change_type))
    }

    /// Returns true if an entity with `change_type` is visible.
    #[must_use]
    pub const fn admits(&self, change_type: ChangeType) -> bool {
        match self.condition {
            Condition::Not => !self.change_types.contains(change_type),
            Condition::And if self.change_types.len() > 1 => false,
            Condition::And | Condition::Or => self.change_types.contains(change_type),
        }
    }

    fn named(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "ALL" => Some(Self::ALL),
            "ACTUAL" => Some(Self::ACTUAL),
            "CLOSED" => Some(Self::CLOSED),
            _ => None,
        }
    }
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self::ACTUAL
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ActivityRepr {
    Named(String),
    #[serde(rename_all = "camelCase")]
    Explicit {
        change_types: ChangeTypeSet,
        #[serde(default = "Condition::or")]
        condition: Condition,
    },
}

impl TryFrom<ActivityRepr> for ActivityFilter {
    type Error = ModelError;

    fn try_from(repr: ActivityRepr) -> ModelResult<Self> {
        match repr {
            ActivityRepr::Named(name) => ActivityFilter::named(&name).ok_or_else(|| {
                ModelError::invalid_criteria(format!("unknown activity filter '{name}'"))
            }),
            ActivityRepr::Explicit {
                change_types,
                condition,
            } => Ok(ActivityFilter::new(change_types, condition)),
        }
    }
}

/// A filter/sort/search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterCriteria {
    /// Logical field to sort by. Defaults to the entity's natural order.
    pub sort_order_key: Option<String>,
    /// Sort direction.
    pub sort_order_value: SortOrder,
    /// Number of matches to skip.
    pub offset: usize,
    /// Page size, or [`COUNT_ALL`].
    pub count: i32,
    /// Free text, matched by word prefix.
    pub search: Option<String>,
    /// How the free-text block combines with the filters.
    pub search_condition: Condition,
    /// Field filters.
    pub filters: Filters,
    /// Visibility filter.
    pub activity: ActivityFilter,
}

impl FilterCriteria {
    /// Creates criteria with default paging and `ACTUAL` activity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates criteria returning every match.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            count: COUNT_ALL,
            ..Self::default()
        }
    }

    /// Adds a field filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: FilterValue) -> Self {
        self.filters.insert(field, value);
        self
    }

    /// Sets the sort key and direction.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_order_key = Some(field.into());
        self.sort_order_value = order;
        self
    }

    /// Sets offset and page size.
    #[must_use]
    pub fn page(mut self, offset: usize, count: i32) -> Self {
        self.offset = offset;
        self.count = count;
        self
    }

    /// Sets the free text.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Sets how the free text combines with the filters.
    #[must_use]
    pub fn search_condition(mut self, condition: Condition) -> Self {
        self.search_condition = condition;
        self
    }

    /// Sets the visibility filter.
    #[must_use]
    pub fn activity(mut self, activity: ActivityFilter) -> Self {
        self.activity = activity;
        self
    }

    /// Returns the page size, `None` when unbounded.
    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        usize::try_from(self.count).ok()
    }

    /// Checks paging values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCriteria` for a negative count other than [`COUNT_ALL`].
    pub fn validate(&self) -> ModelResult<()> {
        if self.count < COUNT_ALL {
            return Err(ModelError::invalid_criteria(format!(
                "count must be >= 0 or {COUNT_ALL}, got {}",
                self.count
            )));
        }
        Ok(())
    }
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            sort_order_key: None,
            sort_order_value: SortOrder::Asc,
            offset: 0,
            count: COUNT_DEFAULT,
            search: None,
            search_condition: Condition::And,
            filters: Filters::new(),
            activity: ActivityFilter::ACTUAL,
        }
    }
}

/// One page of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterResult<E> {
    /// Matches of the requested page.
    pub items: Vec<E>,
    /// Number of matches of the whole filter.
    pub count_by_filter: usize,
    /// Number of documents in the index.
    pub total_count: usize,
}

impl<E> FilterResult<E> {
    /// Creates a result.
    #[must_use]
    pub const fn new(items: Vec<E>, count_by_filter: usize, total_count: usize) -> Self {
        Self {
            items,
            count_by_filter,
            total_count,
        }
    }

    /// Maps every item.
    pub fn map<T>(self, f: impl FnMut(E) -> T) -> FilterResult<T> {
        FilterResult {
            items: self.items.into_iter().map(f).collect(),
            count_by_filter: self.count_by_filter,
            total_count: self.total_count,
        }
    }
}

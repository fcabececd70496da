//! Compilation of filter criteria into native queries.

use super::{dates, CompiledCriteria, NativeSort, SortKey};
use crate::binder::{canonical_number, tokenizer, NULL_DATE};
use crate::error::{IndexError, IndexResult};
use crate::schema::SchemaDescriptor;
use chrono::{DateTime, Local, Utc};
use rcd_model::{
    ActivityFilter, Condition, FilterCriteria, FilterValue, Filters, ModelError, ValueKind,
    CHANGE_TYPE_FIELD,
};
use std::ops::Bound;
use std::sync::Arc;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, RangeQuery, RegexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::Term;

/// Compiles criteria against the schema of one entity type.
///
/// Compiling is pure: it reads the schema only.
pub struct CriteriaCompiler<E> {
    schema: Arc<SchemaDescriptor<E>>,
}

impl<E> CriteriaCompiler<E> {
    /// Creates a compiler over `schema`.
    #[must_use]
    pub fn new(schema: Arc<SchemaDescriptor<E>>) -> Self {
        Self { schema }
    }

    /// Compiles `criteria`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` if a filter or the sort key names a
    /// field that is not indexed for that use, or `Criteria` if a filter
    /// does not apply to the kind of its field.
    pub fn compile(&self, criteria: &FilterCriteria) -> IndexResult<CompiledCriteria> {
        criteria.validate()?;

        let mut query = self.compile_filters(&criteria.filters)?;
        if let Some(search) = self.compile_search(criteria.search.as_deref())? {
            query = Some(fold(query, criteria.search_condition, search));
        }

        Ok(CompiledCriteria {
            query: query.unwrap_or_else(all),
            sort: self.compile_sort(criteria)?,
            activity: self.compile_activity(&criteria.activity)?,
        })
    }

    /// Compiles a filter map into one folded query, `None` if every filter
    /// was dropped.
    fn compile_filters(&self, filters: &Filters) -> IndexResult<Option<Box<dyn Query>>> {
        let mut folded = None;
        for (name, value) in filters.iter() {
            if let Some(clause) = self.compile_filter(name, value)? {
                folded = Some(fold(folded, value.condition(), clause));
            }
        }
        Ok(folded)
    }

    fn compile_filter(&self, name: &str, value: &FilterValue) -> IndexResult<Option<Box<dyn Query>>> {
        if let FilterValue::Clause { filters, .. } = value {
            return self.compile_filters(filters);
        }

        let descriptor = self.schema.filterable(name)?;
        let (field, kind) = self
            .schema
            .native()
            .field_with_kind(&descriptor.name)
            .ok_or_else(|| IndexError::unknown_field(self.schema.entity_type(), name))?;

        let clause = match value {
            FilterValue::Empty { .. } => Some(empty(&descriptor.name, field, kind)),
            FilterValue::NotEmpty { .. } => Some(negate(empty(&descriptor.name, field, kind))),
            FilterValue::Boolean { value, .. } => {
                self.require_text(name, kind)?;
                Some(term(field, &value.to_string()))
            }
            FilterValue::EnumSet { values, inner, .. } => {
                self.require_text(name, kind)?;
                let clauses = values.iter().map(|value| term(field, value)).collect();
                combine(*inner, clauses)
            }
            FilterValue::StringEq { value, .. } => {
                self.require_text(name, kind)?;
                Some(self.string_clause(&descriptor.name, field, kind, value))
            }
            FilterValue::StringSet { values, inner, .. } => {
                self.require_text(name, kind)?;
                let clauses = values
                    .iter()
                    .map(|value| self.string_clause(&descriptor.name, field, kind, value))
                    .collect();
                combine(*inner, clauses)
            }
            FilterValue::DateRange { start, end, .. } => {
                if kind != ValueKind::Date {
                    return Err(self.mismatch(name, "DateRange", kind));
                }
                Some(date_range(&descriptor.name, *start, *end))
            }
            FilterValue::Clause { .. } => None,
        };
        Ok(clause)
    }

    /// Exact match, or `Empty` for blank values.
    fn string_clause(&self, name: &str, field: Field, kind: ValueKind, value: &str) -> Box<dyn Query> {
        if value.trim().is_empty() {
            return empty(name, field, kind);
        }
        if kind == ValueKind::Number {
            if let Ok(number) = value.trim().parse::<f64>() {
                return term(field, &canonical_number(number));
            }
        }
        term(field, value)
    }

    fn require_text(&self, name: &str, kind: ValueKind) -> IndexResult<()> {
        if kind == ValueKind::Date {
            Err(self.mismatch(name, "an exact-match filter", kind))
        } else {
            Ok(())
        }
    }

    fn mismatch(&self, name: &str, filter: &str, kind: ValueKind) -> IndexError {
        IndexError::Criteria(ModelError::invalid_criteria(format!(
            "{filter} does not apply to {kind:?} field '{name}' of {}",
            self.schema.entity_type()
        )))
    }

    /// One required prefix clause per word of the free text.
    fn compile_search(&self, search: Option<&str>) -> IndexResult<Option<Box<dyn Query>>> {
        let Some(search) = search else {
            return Ok(None);
        };
        let field = self.schema.native().default_search();
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for word in search.split_whitespace() {
            for token in tokenizer::tokenize(word) {
                let prefix = RegexQuery::from_pattern(&format!("{token}.*"), field)?;
                clauses.push((Occur::Must, Box::new(prefix)));
            }
        }
        if clauses.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Box::new(BooleanQuery::new(clauses))))
        }
    }

    /// The requested key, then the primary key as tie-break. Without a
    /// requested key: the name of named entities, then the primary key.
    fn compile_sort(&self, criteria: &FilterCriteria) -> IndexResult<NativeSort> {
        let primary_key = self.schema.primary_key();
        let mut sort = NativeSort::default();
        let mut push = |name: &str, descending: bool| -> IndexResult<()> {
            let descriptor = self.schema.sortable(name)?;
            let (field, kind) = self
                .schema
                .native()
                .field_with_kind(&descriptor.name)
                .ok_or_else(|| IndexError::unknown_field(self.schema.entity_type(), name))?;
            if !sort.keys.iter().any(|key| key.field == field) {
                sort.keys.push(SortKey {
                    name: descriptor.name.clone(),
                    field,
                    kind,
                    descending,
                });
            }
            Ok(())
        };

        match criteria.sort_order_key.as_deref() {
            Some(key) => push(key, criteria.sort_order_value.is_descending())?,
            None => {
                if let Some(name_field) = self.schema.name_field() {
                    push(name_field, false)?;
                }
            }
        }
        push(&primary_key.name, false)?;
        Ok(sort)
    }

    fn compile_activity(&self, activity: &ActivityFilter) -> IndexResult<Option<Box<dyn Query>>> {
        if activity.is_all() || !self.schema.is_versioned() {
            return Ok(None);
        }
        let field = self
            .schema
            .native()
            .field(CHANGE_TYPE_FIELD)
            .ok_or_else(|| IndexError::unknown_field(self.schema.entity_type(), CHANGE_TYPE_FIELD))?;
        let clauses = activity
            .admitted()
            .map(|change_type| term(field, change_type.name()))
            .collect();
        // No admitted type: AND over several types, or NOT over all of them.
        Ok(Some(
            combine(Condition::Or, clauses).unwrap_or_else(|| negate(all())),
        ))
    }
}

impl<E> std::fmt::Debug for CriteriaCompiler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriteriaCompiler")
            .field("entity_type", &self.schema.entity_type())
            .finish()
    }
}

fn all() -> Box<dyn Query> {
    Box::new(AllQuery)
}

fn term(field: Field, value: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, value),
        IndexRecordOption::Basic,
    ))
}

fn negate(query: Box<dyn Query>) -> Box<dyn Query> {
    Box::new(BooleanQuery::new(vec![
        (Occur::Must, all()),
        (Occur::MustNot, query),
    ]))
}

const fn occur(condition: Condition) -> Occur {
    match condition {
        Condition::And => Occur::Must,
        Condition::Or => Occur::Should,
        Condition::Not => Occur::MustNot,
    }
}

/// Combines `clause` with the previously folded query.
fn fold(folded: Option<Box<dyn Query>>, condition: Condition, clause: Box<dyn Query>) -> Box<dyn Query> {
    match (folded, condition) {
        (None, Condition::Not) => negate(clause),
        (None, Condition::And | Condition::Or) => clause,
        (Some(folded), Condition::Or) => Box::new(BooleanQuery::new(vec![
            (Occur::Should, folded),
            (Occur::Should, clause),
        ])),
        (Some(folded), condition) => Box::new(BooleanQuery::new(vec![
            (Occur::Must, folded),
            (occur(condition), clause),
        ])),
    }
}

/// Combines the clauses of a set filter, `None` if there are none.
fn combine(inner: Condition, clauses: Vec<Box<dyn Query>>) -> Option<Box<dyn Query>> {
    if clauses.is_empty() {
        return None;
    }
    let occur = occur(inner);
    let mut combined: Vec<(Occur, Box<dyn Query>)> = clauses.into_iter().map(|q| (occur, q)).collect();
    if inner == Condition::Not {
        combined.insert(0, (Occur::Must, all()));
    }
    Some(Box::new(BooleanQuery::new(combined)))
}

/// Field has no value: the null sentinel for dates, otherwise no term at
/// all.
fn empty(name: &str, field: Field, kind: ValueKind) -> Box<dyn Query> {
    if kind == ValueKind::Date {
        return Box::new(TermQuery::new(
            Term::from_field_i64(field, NULL_DATE),
            IndexRecordOption::Basic,
        ));
    }
    let any_value: Box<dyn Query> = Box::new(RangeQuery::new_str_bounds(
        name.to_string(),
        Bound::Unbounded,
        Bound::Unbounded,
    ));
    negate(any_value)
}

/// Whole days `start..=end` in local time. The null sentinel is outside
/// every range, open or not.
fn date_range(name: &str, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Box<dyn Query> {
    let lower = start.map_or(Bound::Excluded(NULL_DATE), |start| {
        Bound::Included(dates::start_of_day(start, &Local))
    });
    let upper = end.map_or(Bound::Unbounded, |end| {
        Bound::Included(dates::end_of_day(end, &Local))
    });
    Box::new(RangeQuery::new_i64_bounds(name.to_string(), lower, upper))
}

//! Uniqueness checks over indexed values.
//!
//! A value is checked against its siblings: the entities sharing the same
//! parent through a relation field. Closed entities do not count.
//!
//! [`UniquenessScanner::are_all_unique`] checks a whole sibling set in one
//! pass. The siblings are read in pages sorted by the indexed form of the
//! candidate field, so equal values are adjacent and comparing each value
//! to its predecessor is enough. Each page starts at the last value of the
//! previous one; only one page and the previous value are held.

use crate::binder::{canonical_number, DocumentBinder, NULL_DATE};
use crate::criteria::CriteriaCompiler;
use crate::error::{IndexError, IndexResult};
use crate::lifecycle::IndexManager;
use crate::schema::SchemaDescriptor;
use crate::search::{self, ColumnKey, SortValue};
use rcd_model::{FieldValue, FilterCriteria, FilterValue, Indexed, ValueKind};
use std::ops::Bound;
use std::sync::Arc;
use tantivy::query::{BooleanQuery, Occur, Query, RangeQuery};
use tantivy::TantivyDocument;
use tracing::debug;

/// Siblings read per page when scanning for duplicates.
const SCAN_PAGE: usize = 512;

/// Where a scan page starts.
#[derive(Debug, Clone, PartialEq)]
enum PageStart {
    /// Every sibling, those without a value first.
    First,
    /// Siblings holding any value.
    AnyValue,
    /// Siblings holding this text or a greater one.
    FromText(String),
    /// Siblings dated at or after this instant.
    FromDate(i64),
}

impl PageStart {
    /// Start of the page following one that closed with `last`.
    fn after(last: Option<&SortValue>) -> Self {
        match last {
            Some(SortValue::Text(text)) => PageStart::FromText(text.clone()),
            Some(SortValue::Number(number)) => PageStart::FromText(canonical_number(*number)),
            Some(SortValue::Date(millis)) => PageStart::FromDate(*millis),
            Some(SortValue::Missing) | None => PageStart::AnyValue,
        }
    }

    fn reopens_last(&self) -> bool {
        matches!(self, PageStart::FromText(_) | PageStart::FromDate(_))
    }
}

/// Detects equal neighbours in a sorted sequence.
///
/// The initial state is a sentinel distinct from every value.
#[derive(Debug)]
pub struct AdjacentDuplicates<T> {
    previous: Option<T>,
}

impl<T: PartialEq> AdjacentDuplicates<T> {
    /// Creates a detector in its initial state.
    pub const fn new() -> Self {
        Self { previous: None }
    }

    /// Observes the next value. Returns true if it equals the previous one.
    pub fn observe(&mut self, value: T) -> bool {
        let duplicate = self.previous.as_ref() == Some(&value);
        self.previous = Some(value);
        duplicate
    }

    /// Returns the last observed value.
    pub fn last(&self) -> Option<&T> {
        self.previous.as_ref()
    }
}

impl<T: PartialEq> Default for AdjacentDuplicates<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks the uniqueness of one field among siblings.
pub struct UniquenessScanner<E> {
    manager: Arc<IndexManager>,
    binder: DocumentBinder<E>,
    compiler: CriteriaCompiler<E>,
    field: String,
}

impl<E: Indexed> UniquenessScanner<E> {
    /// Creates a scanner of `field`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` unless `field` is filterable and
    /// sortable.
    pub fn new(
        manager: Arc<IndexManager>,
        schema: Arc<SchemaDescriptor<E>>,
        field: &str,
    ) -> IndexResult<Self> {
        schema.filterable(field)?;
        schema.sortable(field)?;
        Ok(Self {
            manager,
            binder: DocumentBinder::new(Arc::clone(&schema)),
            compiler: CriteriaCompiler::new(schema),
            field: field.to_string(),
        })
    }

    /// Returns the checked field.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns true if no sibling other than `excluding_id` holds `value`.
    ///
    /// Siblings are the entities whose `relation_field` equals
    /// `relation_id`. At most two matches are read.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` for an unknown relation field, or the
    /// engine failure.
    pub fn is_unique(
        &self,
        relation_field: &str,
        relation_id: &str,
        value: &str,
        excluding_id: Option<&str>,
    ) -> IndexResult<bool> {
        let criteria = FilterCriteria::new()
            .filter(relation_field, FilterValue::string_eq(relation_id))
            .filter(self.field.as_str(), FilterValue::string_eq(value))
            .page(0, 2);
        let compiled = self.compiler.compile(&criteria)?;

        let searcher = self.manager.searcher()?;
        self.manager.stats().record_search();
        let mut keys = Vec::with_capacity(2);
        for address in search::first_matches(&searcher, &compiled, 2)? {
            let document: TantivyDocument = searcher.doc(address)?;
            keys.push(self.binder.key_of(&document));
        }

        let unique = match keys.as_slice() {
            [] => true,
            [Some(key)] => excluding_id == Some(key.as_str()),
            _ => false,
        };
        if !unique {
            debug!(
                "value '{}' of {}.{} is not unique under {} = {}",
                value,
                E::ENTITY_TYPE,
                self.field,
                relation_field,
                relation_id
            );
        }
        Ok(unique)
    }

    /// Fails with `DuplicateValue` unless [`is_unique`](Self::is_unique).
    ///
    /// # Errors
    ///
    /// Returns `DuplicateValue`, or the failure of the check itself.
    pub fn ensure_unique(
        &self,
        relation_field: &str,
        relation_id: &str,
        value: &str,
        excluding_id: Option<&str>,
    ) -> IndexResult<()> {
        if self.is_unique(relation_field, relation_id, value, excluding_id)? {
            Ok(())
        } else {
            Err(IndexError::duplicate_value(E::ENTITY_TYPE, &self.field, value))
        }
    }

    /// Returns true if every sibling under `relation_id` holds a distinct
    /// value. Siblings without a value are ignored.
    ///
    /// # Errors
    ///
    /// Returns `UnknownIndexedField` for an unknown relation field, or the
    /// engine or payload failure.
    pub fn are_all_unique(&self, relation_field: &str, relation_id: &str) -> IndexResult<bool> {
        Ok(self.first_duplicate(relation_field, relation_id)?.is_none())
    }

    /// Returns the first duplicated value under `relation_id` in the order
    /// of the indexed values.
    ///
    /// # Errors
    ///
    /// Same as [`are_all_unique`](Self::are_all_unique).
    pub fn first_duplicate(
        &self,
        relation_field: &str,
        relation_id: &str,
    ) -> IndexResult<Option<FieldValue>> {
        let criteria =
            FilterCriteria::new().filter(relation_field, FilterValue::string_eq(relation_id));
        let siblings = self.compiler.compile(&criteria)?.executable();
        let descriptor = self.binder.schema().field(&self.field)?;
        let key = ColumnKey::encoded(&self.field, descriptor.kind);

        let searcher = self.manager.searcher()?;
        self.manager.stats().record_search();
        let mut detector = AdjacentDuplicates::new();
        let mut start = PageStart::First;
        loop {
            let query: Box<dyn Query> = match self.page_bound(&start, descriptor.kind) {
                Some(bound) => Box::new(BooleanQuery::new(vec![
                    (Occur::Must, siblings.box_clone()),
                    (Occur::Must, bound),
                ])),
                None => siblings.box_clone(),
            };
            let rows = search::sorted(&searcher, query.as_ref(), vec![key.clone()], SCAN_PAGE)?;
            let full = rows.len() == SCAN_PAGE;
            // A page after the first opens with the value that closed the
            // previous one.
            let skip = usize::from(start.reopens_last());

            for mut row in rows.into_iter().skip(skip) {
                let value = row.values.pop().unwrap_or(SortValue::Missing);
                if value == SortValue::Missing {
                    continue;
                }
                if detector.observe(value) {
                    let document: TantivyDocument = searcher.doc(row.address)?;
                    let duplicate = descriptor.read(&self.binder.decode(&document)?);
                    debug!(
                        "duplicate value {:?} of {}.{} under {} = {}",
                        duplicate,
                        E::ENTITY_TYPE,
                        self.field,
                        relation_field,
                        relation_id
                    );
                    return Ok(Some(duplicate));
                }
            }
            if !full {
                return Ok(None);
            }
            start = PageStart::after(detector.last());
        }
    }

    fn page_bound(&self, start: &PageStart, kind: ValueKind) -> Option<Box<dyn Query>> {
        let name = self.field.clone();
        let query = match (start, kind) {
            (PageStart::First, _) => return None,
            (PageStart::AnyValue, ValueKind::Date) => {
                RangeQuery::new_i64_bounds(name, Bound::Excluded(NULL_DATE), Bound::Unbounded)
            }
            (PageStart::AnyValue, _) => {
                RangeQuery::new_str_bounds(name, Bound::Unbounded, Bound::Unbounded)
            }
            (PageStart::FromText(text), _) => {
                RangeQuery::new_str_bounds(name, Bound::Included(text.as_str()), Bound::Unbounded)
            }
            (PageStart::FromDate(millis), _) => {
                RangeQuery::new_i64_bounds(name, Bound::Included(*millis), Bound::Unbounded)
            }
        };
        Some(Box::new(query))
    }
}

impl<E> std::fmt::Debug for UniquenessScanner<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniquenessScanner")
            .field("index", &self.manager.name())
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::schema::SchemaRegistry;
    use proptest::prelude::*;
    use rcd_model::{Field, Group, Relation, Versioned};
    use tempfile::{tempdir, TempDir};

    fn scanner(temp: &TempDir) -> (UniquenessScanner<Field>, Arc<IndexManager>, DocumentBinder<Field>) {
        let schema = SchemaRegistry::new().describe::<Field>().unwrap();
        let manager = Arc::new(IndexManager::new(
            Field::ENTITY_TYPE,
            schema.native().schema().clone(),
            IndexConfig::new(temp.path()),
        ));
        manager.open().unwrap();
        let scanner = UniquenessScanner::new(Arc::clone(&manager), Arc::clone(&schema), "value").unwrap();
        (scanner, manager, DocumentBinder::new(schema))
    }

    fn index(manager: &IndexManager, binder: &DocumentBinder<Field>, fields: &[Field]) {
        let mut writer = manager.writer().unwrap();
        for field in fields {
            writer.upsert(binder.key_term(&field.id), binder.encode(field).unwrap());
        }
        writer.commit().unwrap();
    }

    // === Adjacent duplicates ===

    #[test]
    fn sentinel_differs_from_first_value() {
        let mut detector = AdjacentDuplicates::new();
        assert!(!detector.observe(String::new()));
        assert!(detector.observe(String::new()));
    }

    proptest! {
        #[test]
        fn strictly_increasing_has_no_duplicate(values in prop::collection::btree_set(any::<i64>(), 0..200)) {
            let mut detector = AdjacentDuplicates::new();
            prop_assert!(values.into_iter().all(|v| !detector.observe(v)));
        }

        #[test]
        fn one_repeated_value_is_found(
            values in prop::collection::btree_set(any::<i64>(), 1..200),
            pick in any::<prop::sample::Index>(),
        ) {
            let mut sorted: Vec<i64> = values.into_iter().collect();
            let at = pick.index(sorted.len());
            sorted.insert(at, sorted[at]);

            let mut detector = AdjacentDuplicates::new();
            let found = sorted.into_iter().filter(|v| detector.observe(*v)).count();
            prop_assert_eq!(found, 1);
        }
    }

    // === Scanner ===

    #[test]
    fn equal_siblings_are_not_unique() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let a = Field::new("meta-1", "red");
        let mut b = Field::new("meta-1", "red");
        index(&manager, &binder, &[a.clone(), b.clone(), Field::new("meta-1", "blue")]);

        assert!(!scanner.are_all_unique(Field::RELATION_FIELD, "meta-1").unwrap());
        assert_eq!(
            scanner.first_duplicate(Field::RELATION_FIELD, "meta-1").unwrap(),
            Some(FieldValue::text("red"))
        );

        b.value = Some("green".into());
        index(&manager, &binder, &[b]);
        assert!(scanner.are_all_unique(Field::RELATION_FIELD, "meta-1").unwrap());
    }

    #[test]
    fn siblings_of_other_parents_do_not_count() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        index(
            &manager,
            &binder,
            &[Field::new("meta-1", "red"), Field::new("meta-2", "red")],
        );

        assert!(scanner.are_all_unique(Field::RELATION_FIELD, "meta-1").unwrap());
        assert!(scanner.are_all_unique(Field::RELATION_FIELD, "meta-2").unwrap());
    }

    #[test]
    fn closed_siblings_do_not_count() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let mut closed = Field::new("meta-1", "red");
        closed.close();
        index(&manager, &binder, &[Field::new("meta-1", "red"), closed]);

        assert!(scanner.are_all_unique(Field::RELATION_FIELD, "meta-1").unwrap());
    }

    #[test]
    fn siblings_without_value_are_ignored() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let mut a = Field::new("meta-1", "");
        a.value = None;
        let mut b = Field::new("meta-1", "");
        b.value = None;
        index(&manager, &binder, &[a, b]);

        assert!(scanner.are_all_unique(Field::RELATION_FIELD, "meta-1").unwrap());
    }

    #[test]
    fn is_unique_excludes_the_entity_itself() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let red = Field::new("meta-1", "red");
        index(&manager, &binder, &[red.clone()]);

        assert!(scanner.is_unique(Field::RELATION_FIELD, "meta-1", "blue", None).unwrap());
        assert!(!scanner.is_unique(Field::RELATION_FIELD, "meta-1", "red", None).unwrap());
        assert!(scanner
            .is_unique(Field::RELATION_FIELD, "meta-1", "red", Some(&red.id))
            .unwrap());
        assert!(!scanner
            .is_unique(Field::RELATION_FIELD, "meta-1", "red", Some("other"))
            .unwrap());
    }

    #[test]
    fn two_matches_are_never_unique() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let a = Field::new("meta-1", "red");
        index(&manager, &binder, &[a.clone(), Field::new("meta-1", "red")]);

        assert!(!scanner
            .is_unique(Field::RELATION_FIELD, "meta-1", "red", Some(&a.id))
            .unwrap());
        let err = scanner
            .ensure_unique(Field::RELATION_FIELD, "meta-1", "red", Some(&a.id))
            .unwrap_err();
        assert!(matches!(err, IndexError::DuplicateValue { .. }));
    }

    #[test]
    fn duplicates_are_found_across_pages() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let siblings: Vec<Field> = (0..SCAN_PAGE * 2 + 10)
            .map(|n| Field::new("meta-1", &format!("v{n:05}")))
            .collect();
        index(&manager, &binder, &siblings);
        assert!(scanner.are_all_unique(Field::RELATION_FIELD, "meta-1").unwrap());

        // Closes the first page and opens the second.
        let boundary = format!("v{:05}", SCAN_PAGE - 1);
        index(&manager, &binder, &[Field::new("meta-1", &boundary)]);
        assert_eq!(
            scanner.first_duplicate(Field::RELATION_FIELD, "meta-1").unwrap(),
            Some(FieldValue::text(&boundary))
        );
    }

    #[test]
    fn a_page_of_missing_values_is_skipped() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let mut siblings: Vec<Field> = (0..SCAN_PAGE + 5)
            .map(|_| {
                let mut field = Field::new("meta-1", "");
                field.value = None;
                field
            })
            .collect();
        siblings.push(Field::new("meta-1", "red"));
        index(&manager, &binder, &siblings);
        assert!(scanner.are_all_unique(Field::RELATION_FIELD, "meta-1").unwrap());

        index(&manager, &binder, &[Field::new("meta-1", "red")]);
        assert_eq!(
            scanner.first_duplicate(Field::RELATION_FIELD, "meta-1").unwrap(),
            Some(FieldValue::text("red"))
        );
    }

    #[test]
    fn is_unique_among_many_siblings() {
        let temp = tempdir().unwrap();
        let (scanner, manager, binder) = scanner(&temp);
        let siblings: Vec<Field> = (0..300).map(|_| Field::new("meta-1", "red")).collect();
        index(&manager, &binder, &siblings);

        assert!(!scanner
            .is_unique(Field::RELATION_FIELD, "meta-1", "red", Some(&siblings[0].id))
            .unwrap());
        assert!(scanner.is_unique(Field::RELATION_FIELD, "meta-1", "blue", None).unwrap());
    }

    #[test]
    fn next_page_starts_at_the_last_value() {
        assert_eq!(PageStart::after(None), PageStart::AnyValue);
        assert_eq!(
            PageStart::after(Some(&SortValue::Number(2.0))),
            PageStart::FromText("2".into())
        );
        assert!(PageStart::after(Some(&SortValue::Date(5))).reopens_last());
        assert!(!PageStart::AnyValue.reopens_last());
    }

    #[test]
    fn unknown_candidate_field_is_rejected() {
        let temp = tempdir().unwrap();
        let (_, manager, _) = scanner(&temp);
        let schema = SchemaRegistry::new().describe::<Group>().unwrap();
        let err = UniquenessScanner::new(manager, schema, "colour").unwrap_err();
        assert!(matches!(err, IndexError::UnknownIndexedField { .. }));
    }
}

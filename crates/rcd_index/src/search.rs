//! Query execution: matching, sorting, paging and decoding.
//!
//! Sort keys are read from columnar storage while matches are collected.
//! Each segment keeps a bounded window of the best rows, the windows are
//! merged, and entities are decoded only for the requested page.

use crate::binder::{DocumentBinder, NULL_DATE};
use crate::criteria::{CompiledCriteria, SortKey};
use crate::error::IndexResult;
use rcd_model::{FilterResult, Indexed, ValueKind};
use std::cmp::Ordering;
use std::io;
use std::sync::Arc;
use tantivy::collector::{Collector, Count, SegmentCollector};
use tantivy::columnar::{Column, StrColumn};
use tantivy::query::Query;
use tantivy::{DocAddress, DocId, Score, Searcher, SegmentOrdinal, SegmentReader, TantivyDocument};

/// Value of one sort key.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// No value. Sorts first in ascending order.
    Missing,
    /// Text, compared by code point.
    Text(String),
    /// Number, compared numerically.
    Number(f64),
    /// Epoch milliseconds.
    Date(i64),
}

impl SortValue {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Missing, SortValue::Missing) => Ordering::Equal,
            (SortValue::Missing, _) => Ordering::Less,
            (_, SortValue::Missing) => Ordering::Greater,
            (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
            // Numbers before unparsable text of the same field.
            (SortValue::Number(_), _) => Ordering::Less,
            (_, SortValue::Number(_)) => Ordering::Greater,
            (SortValue::Date(_), _) => Ordering::Less,
            (_, SortValue::Date(_)) => Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Number,
    Date,
}

/// Column read for one sort key, and its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnKey {
    name: String,
    kind: ColumnKind,
    descending: bool,
}

impl ColumnKey {
    /// Orders values the way `key` does.
    #[must_use]
    pub fn sorting(key: &SortKey) -> Self {
        let kind = match key.kind {
            ValueKind::Date => ColumnKind::Date,
            ValueKind::Number => ColumnKind::Number,
            _ => ColumnKind::Text,
        };
        Self {
            name: key.name.clone(),
            kind,
            descending: key.descending,
        }
    }

    /// Orders values of `name` ascending by their indexed form.
    ///
    /// Numbers compare as their canonical text, which agrees with range
    /// queries over the same field.
    #[must_use]
    pub fn encoded(name: &str, kind: ValueKind) -> Self {
        let kind = match kind {
            ValueKind::Date => ColumnKind::Date,
            _ => ColumnKind::Text,
        };
        Self {
            name: name.to_string(),
            kind,
            descending: false,
        }
    }
}

/// Compares two rows of sort values key by key.
pub fn compare_rows(keys: &[ColumnKey], a: &[SortValue], b: &[SortValue]) -> Ordering {
    for ((key, left), right) in keys.iter().zip(a).zip(b) {
        let ordering = left.compare(right);
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// One match with its sort values.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedRow {
    /// Values, one per key.
    pub values: Vec<SortValue>,
    /// Address of the match.
    pub address: DocAddress,
}

/// Ties fall back to index order.
fn compare_sorted(keys: &[ColumnKey], a: &SortedRow, b: &SortedRow) -> Ordering {
    compare_rows(keys, &a.values, &b.values).then_with(|| a.address.cmp(&b.address))
}

/// Rows kept best first, at most `limit` once finished.
struct Window {
    keys: Arc<[ColumnKey]>,
    limit: Option<usize>,
    rows: Vec<SortedRow>,
}

impl Window {
    fn new(keys: Arc<[ColumnKey]>, limit: Option<usize>) -> Self {
        Self {
            keys,
            limit,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: SortedRow) {
        self.rows.push(row);
        if let Some(limit) = self.limit {
            if self.rows.len() > limit.saturating_mul(2).max(64) {
                self.shrink(limit);
            }
        }
    }

    fn shrink(&mut self, limit: usize) {
        if self.rows.len() <= limit {
            return;
        }
        let keys = Arc::clone(&self.keys);
        self.rows
            .select_nth_unstable_by(limit, |a, b| compare_sorted(&keys, a, b));
        self.rows.truncate(limit);
    }

    fn finish(mut self) -> Vec<SortedRow> {
        if let Some(limit) = self.limit {
            self.shrink(limit);
        }
        let keys = Arc::clone(&self.keys);
        self.rows.sort_by(|a, b| compare_sorted(&keys, a, b));
        self.rows
    }
}

/// Collects the first `limit` matches in sort order.
pub struct SortedTop {
    keys: Arc<[ColumnKey]>,
    limit: Option<usize>,
}

impl SortedTop {
    /// Keeps the first `limit` rows, or every row for `None`.
    #[must_use]
    pub fn new(keys: Vec<ColumnKey>, limit: Option<usize>) -> Self {
        Self {
            keys: keys.into(),
            limit,
        }
    }
}

impl Collector for SortedTop {
    type Fruit = Vec<SortedRow>;
    type Child = SegmentSortedTop;

    fn for_segment(
        &self,
        segment_ord: SegmentOrdinal,
        reader: &SegmentReader,
    ) -> tantivy::Result<Self::Child> {
        let columns = self
            .keys
            .iter()
            .map(|key| KeyColumn::open(reader, key))
            .collect::<tantivy::Result<Vec<_>>>()?;
        Ok(SegmentSortedTop {
            segment_ord,
            columns,
            window: Window::new(Arc::clone(&self.keys), self.limit),
            failure: None,
        })
    }

    fn requires_scoring(&self) -> bool {
        false
    }

    fn merge_fruits(
        &self,
        segment_fruits: Vec<io::Result<Vec<SortedRow>>>,
    ) -> tantivy::Result<Self::Fruit> {
        let mut merged = Window::new(Arc::clone(&self.keys), self.limit);
        for fruit in segment_fruits {
            for row in fruit? {
                merged.push(row);
            }
        }
        Ok(merged.finish())
    }
}

/// Per-segment side of [`SortedTop`].
pub struct SegmentSortedTop {
    segment_ord: SegmentOrdinal,
    columns: Vec<KeyColumn>,
    window: Window,
    failure: Option<io::Error>,
}

impl SegmentCollector for SegmentSortedTop {
    type Fruit = io::Result<Vec<SortedRow>>;

    fn collect(&mut self, doc: DocId, _score: Score) {
        if self.failure.is_some() {
            return;
        }
        let values = self
            .columns
            .iter()
            .map(|column| column.read(doc))
            .collect::<io::Result<Vec<_>>>();
        match values {
            Ok(values) => self.window.push(SortedRow {
                values,
                address: DocAddress::new(self.segment_ord, doc),
            }),
            Err(err) => self.failure = Some(err),
        }
    }

    fn harvest(self) -> Self::Fruit {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.window.finish()),
        }
    }
}

/// Column of one sort key within one segment. `None` when the segment
/// holds no value for it.
enum KeyColumn {
    Text(Option<StrColumn>),
    Number(Option<StrColumn>),
    Date(Option<Column<i64>>),
}

impl KeyColumn {
    fn open(reader: &SegmentReader, key: &ColumnKey) -> tantivy::Result<Self> {
        let fast = reader.fast_fields();
        Ok(match key.kind {
            ColumnKind::Text => KeyColumn::Text(fast.str(&key.name)?),
            ColumnKind::Number => KeyColumn::Number(fast.str(&key.name)?),
            ColumnKind::Date => KeyColumn::Date(fast.column_opt::<i64>(&key.name)?),
        })
    }

    fn read(&self, doc: DocId) -> io::Result<SortValue> {
        Ok(match self {
            KeyColumn::Text(column) => {
                text_at(column.as_ref(), doc)?.map_or(SortValue::Missing, SortValue::Text)
            }
            KeyColumn::Number(column) => match text_at(column.as_ref(), doc)? {
                Some(text) => match text.parse::<f64>() {
                    Ok(number) => SortValue::Number(number),
                    Err(_) => SortValue::Text(text),
                },
                None => SortValue::Missing,
            },
            KeyColumn::Date(column) => column
                .as_ref()
                .and_then(|column| column.first(doc))
                .filter(|millis| *millis != NULL_DATE)
                .map_or(SortValue::Missing, SortValue::Date),
        })
    }
}

fn text_at(column: Option<&StrColumn>, doc: DocId) -> io::Result<Option<String>> {
    let Some(column) = column else {
        return Ok(None);
    };
    let Some(ord) = column.term_ords(doc).next() else {
        return Ok(None);
    };
    let mut text = String::new();
    Ok(column.ord_to_str(ord, &mut text)?.then_some(text))
}

/// Returns the first `limit` matches of `query` ordered by `keys`, with
/// their values.
///
/// # Errors
///
/// Returns the engine failure.
pub fn sorted(
    searcher: &Searcher,
    query: &dyn Query,
    keys: Vec<ColumnKey>,
    limit: usize,
) -> IndexResult<Vec<SortedRow>> {
    Ok(searcher.search(query, &SortedTop::new(keys, Some(limit)))?)
}

/// Returns the addresses of the first `limit` matches in sort order.
///
/// # Errors
///
/// Returns the engine failure.
pub fn first_matches(
    searcher: &Searcher,
    compiled: &CompiledCriteria,
    limit: usize,
) -> IndexResult<Vec<DocAddress>> {
    let query = compiled.executable();
    let rows = sorted(searcher, query.as_ref(), sort_columns(compiled), limit)?;
    Ok(rows.into_iter().map(|row| row.address).collect())
}

fn sort_columns(compiled: &CompiledCriteria) -> Vec<ColumnKey> {
    compiled.sort.keys.iter().map(ColumnKey::sorting).collect()
}

/// Counts the matches of `compiled`.
///
/// # Errors
///
/// Returns the engine failure.
pub fn count(searcher: &Searcher, compiled: &CompiledCriteria) -> IndexResult<usize> {
    let query = compiled.executable();
    Ok(searcher.search(query.as_ref(), &Count)?)
}

/// Executes `compiled` and decodes one page.
///
/// At most `offset + limit` rows are held while collecting.
///
/// # Errors
///
/// Returns the engine failure or a payload error.
pub fn find<E: Indexed>(
    searcher: &Searcher,
    binder: &DocumentBinder<E>,
    compiled: &CompiledCriteria,
    offset: usize,
    limit: Option<usize>,
) -> IndexResult<FilterResult<E>> {
    let total = usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX);
    if limit == Some(0) {
        return Ok(FilterResult::new(Vec::new(), count(searcher, compiled)?, total));
    }

    let query = compiled.executable();
    let window = limit.map(|limit| offset.saturating_add(limit));
    let collector = (Count, SortedTop::new(sort_columns(compiled), window));
    let (matched, rows) = searcher.search(query.as_ref(), &collector)?;

    let mut items = Vec::new();
    for row in rows.into_iter().skip(offset) {
        let document: TantivyDocument = searcher.doc(row.address)?;
        items.push(binder.decode(&document)?);
    }
    Ok(FilterResult::new(items, matched, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(descending: bool) -> ColumnKey {
        let mut builder = tantivy::schema::Schema::builder();
        let field = builder.add_text_field("name", tantivy::schema::STRING);
        ColumnKey::sorting(&SortKey {
            name: "name".into(),
            field,
            kind: ValueKind::String,
            descending,
        })
    }

    fn row(value: &str, doc: DocId) -> SortedRow {
        SortedRow {
            values: vec![SortValue::Text(value.into())],
            address: DocAddress::new(0, doc),
        }
    }

    #[test]
    fn missing_sorts_first() {
        let text = SortValue::Text("a".into());
        assert_eq!(SortValue::Missing.compare(&text), Ordering::Less);
        assert_eq!(text.compare(&SortValue::Missing), Ordering::Greater);
    }

    #[test]
    fn numbers_compare_numerically() {
        let nine = SortValue::Number(9.0);
        let ten = SortValue::Number(10.0);
        assert_eq!(nine.compare(&ten), Ordering::Less);
        assert_eq!(
            SortValue::Text("9".into()).compare(&SortValue::Text("10".into())),
            Ordering::Greater
        );
    }

    #[test]
    fn rows_compare_key_by_key() {
        let keys = [key(false), key(true)];
        let a = [SortValue::Text("x".into()), SortValue::Text("1".into())];
        let b = [SortValue::Text("x".into()), SortValue::Text("2".into())];

        // Second key is descending.
        assert_eq!(compare_rows(&keys, &a, &b), Ordering::Greater);
        assert_eq!(compare_rows(&keys, &a, &a), Ordering::Equal);
    }

    #[test]
    fn descending_reverses() {
        let keys = [key(true)];
        let a = [SortValue::Text("a".into())];
        let b = [SortValue::Text("b".into())];
        assert_eq!(compare_rows(&keys, &a, &b), Ordering::Greater);
    }

    #[test]
    fn encoded_numbers_compare_as_text() {
        assert_eq!(ColumnKey::encoded("ordinal", ValueKind::Number).kind, ColumnKind::Text);
        assert_eq!(ColumnKey::encoded("changeDate", ValueKind::Date).kind, ColumnKind::Date);
    }

    #[test]
    fn window_keeps_the_best_rows_in_order() {
        let mut window = Window::new(vec![key(false)].into(), Some(3));
        for doc in (0..500).rev() {
            window.push(row(&format!("{doc:04}"), doc));
        }
        assert!(window.rows.len() <= 64 + 1);

        let rows = window.finish();
        let values: Vec<_> = rows.iter().map(|row| row.address.doc_id).collect();
        assert_eq!(values, [0, 1, 2]);
    }

    #[test]
    fn window_breaks_ties_by_address() {
        let mut window = Window::new(vec![key(false)].into(), None);
        window.push(row("a", 7));
        window.push(row("a", 3));
        window.push(row("0", 9));

        let docs: Vec<_> = window.finish().iter().map(|row| row.address.doc_id).collect();
        assert_eq!(docs, [9, 3, 7]);
    }
}

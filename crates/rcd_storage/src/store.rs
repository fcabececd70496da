//! Authoritative store trait definition.

use crate::error::{StorageError, StorageResult};

/// Iterator over pages of entities.
pub type Pages<'a, E> = Box<dyn Iterator<Item = StorageResult<Vec<E>>> + 'a>;

/// Read access to the source of truth of one entity type.
///
/// # Invariants
///
/// - `total_count` equals the number of entities `get_all` returns
/// - `iterate_all` yields every entity exactly once, in pages of at most
///   `page_size` entities, and never yields an empty page
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::JsonLinesStore`] - For persistent storage
pub trait AuthoritativeStore<E>: Send + Sync {
    /// Returns the number of stored entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn total_count(&self) -> StorageResult<usize>;

    /// Returns every stored entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get_all(&self) -> StorageResult<Vec<E>>;

    /// Iterates every stored entity in pages of `page_size`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero page size, or an error if the
    /// store cannot be read. Failures while paging are yielded by the
    /// iterator.
    fn iterate_all(&self, page_size: usize) -> StorageResult<Pages<'_, E>>;
}

/// Splits a snapshot of entities into pages.
#[derive(Debug)]
pub struct PageIter<E> {
    items: std::vec::IntoIter<E>,
    page_size: usize,
}

impl<E> PageIter<E> {
    /// Creates a page iterator over `items`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero page size.
    pub fn new(items: Vec<E>, page_size: usize) -> StorageResult<Self> {
        if page_size == 0 {
            return Err(StorageError::InvalidArgument(
                "page size must be positive".to_string(),
            ));
        }
        Ok(Self {
            items: items.into_iter(),
            page_size,
        })
    }
}

impl<E> Iterator for PageIter<E> {
    type Item = StorageResult<Vec<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        let page: Vec<E> = self.items.by_ref().take(self.page_size).collect();
        if page.is_empty() {
            None
        } else {
            Some(Ok(page))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_split_evenly() {
        let pages: Vec<_> = PageIter::new((0..6).collect::<Vec<_>>(), 3)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(pages, vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn last_page_is_partial() {
        let pages: Vec<_> = PageIter::new((0..5).collect::<Vec<_>>(), 2)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2], vec![4]);
    }

    #[test]
    fn no_pages_for_empty_input() {
        let mut pages = PageIter::<u8>::new(Vec::new(), 10).unwrap();
        assert!(pages.next().is_none());
    }

    #[test]
    fn zero_page_size_fails() {
        assert!(matches!(
            PageIter::new(vec![1], 0),
            Err(StorageError::InvalidArgument(_))
        ));
    }
}

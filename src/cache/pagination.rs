//! Incremental ("load more") pagination

use std::future::Future;

use crate::domain::Page;

/// Pages loaded so far for one list
#[derive(Debug, Clone)]
pub struct InfinitePages<T> {
    page_size: usize,
    pages: Vec<Vec<T>>,
    total: Option<u64>,
}

impl<T> InfinitePages<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            pages: Vec::new(),
            total: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Offset of the next page: pages already loaded times page size
    pub fn next_offset(&self) -> usize {
        self.pages.len() * self.page_size
    }

    pub fn loaded(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Server-reported total from the last page, if any page was loaded
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// More pages exist while fewer items are loaded than the reported total
    pub fn has_more(&self) -> bool {
        self.total.map_or(true, |total| (self.loaded() as u64) < total)
    }

    /// Append a fetched page
    pub fn push_page(&mut self, page: Page<T>) {
        // An empty page means the list shrank under us; stop here
        self.total = if page.items.is_empty() {
            Some(self.loaded() as u64)
        } else {
            Some(page.total)
        };
        if !page.items.is_empty() {
            self.pages.push(page.items);
        }
    }

    /// Fetch and append the next page with `fetch(offset, limit)`.
    ///
    /// Returns `false` without fetching when nothing is left.
    pub async fn load_more<E, F, Fut>(&mut self, fetch: F) -> Result<bool, E>
    where
        F: FnOnce(usize, usize) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
    {
        if !self.has_more() {
            return Ok(false);
        }
        let page = fetch(self.next_offset(), self.page_size).await?;
        self.push_page(page);
        Ok(true)
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flatten()
    }

    /// Forget everything, e.g. after the filters changed
    pub fn reset(&mut self) {
        self.pages.clear();
        self.total = None;
    }
}

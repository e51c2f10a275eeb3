//! Offset to remote page translation.
//!
//! Callers page through listings by item offset, but most sites only accept
//! a page number. The paginator estimates the page for an offset and learns
//! the real page boundaries as results come back.

use std::collections::HashMap;

/// Maps item offsets onto a site's page numbers.
///
/// Not synchronized; keep one per parser and guard it if the parser is
/// shared between tasks.
#[derive(Debug, Clone)]
pub struct Paginator {
    initial_page_size: usize,
    first_page: u32,
    /// Offset -> page that should serve that offset next.
    pages: HashMap<usize, u32>,
}

impl Paginator {
    /// Creates a paginator for a site whose pages start at 1.
    pub fn new(initial_page_size: usize) -> Self {
        Self {
            initial_page_size: initial_page_size.max(1),
            first_page: 1,
            pages: HashMap::new(),
        }
    }

    /// Sets the number of the first page (e.g. 0 for zero-based sites).
    pub fn with_first_page(mut self, first_page: u32) -> Self {
        self.first_page = first_page;
        self
    }

    pub fn first_page(&self) -> u32 {
        self.first_page
    }

    /// Returns the page to request for the given item offset.
    ///
    /// A recorded boundary always wins over the estimate. Without one, an
    /// offset inside a page rounds up to the next page.
    pub fn page_for(&self, offset: usize) -> u32 {
        if offset == 0 {
            return self.first_page;
        }
        if let Some(&page) = self.pages.get(&offset) {
            return page;
        }
        let whole = u32::try_from(offset / self.initial_page_size).unwrap_or(u32::MAX);
        let tail = offset % self.initial_page_size;
        let estimate = whole.saturating_add(self.first_page);
        if tail == 0 { estimate } else { estimate.saturating_add(1) }
    }

    /// Records that `page`, requested for `offset`, returned `count` items.
    ///
    /// An empty page maps the next offset back onto the same page.
    pub fn record_page(&mut self, offset: usize, page: u32, count: usize) {
        let next = if count > 0 { page.saturating_add(1) } else { page };
        self.pages.insert(offset.saturating_add(count), next);
    }
}

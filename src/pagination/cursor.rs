//! Lazy page sequence over one stream partition

use super::types::{NextPage, PagePosition, PageRequest, Paginator, DEFAULT_MAX_PAGES};
use serde_json::Value;
use tracing::warn;

/// Drives a `Paginator` one page at a time.
///
/// The cursor only ever holds the position of the page to fetch next, which
/// is exactly what a bookmark needs to resume without re-emitting pages.
#[derive(Debug)]
pub struct PageCursor {
    paginator: Box<dyn Paginator>,
    position: Option<PagePosition>,
    pages: u64,
    max_pages: u64,
    exhausted: bool,
    truncated: bool,
}

impl PageCursor {
    /// Start from the beginning
    pub fn new(paginator: Box<dyn Paginator>) -> Self {
        let position = paginator.start();
        Self {
            paginator,
            position,
            pages: 0,
            max_pages: DEFAULT_MAX_PAGES,
            exhausted: false,
            truncated: false,
        }
    }

    /// Resume from a bookmarked position (or the beginning when `None`)
    pub fn resume(paginator: Box<dyn Paginator>, position: Option<PagePosition>) -> Self {
        let mut cursor = Self::new(paginator);
        if position.is_some() {
            cursor.position = position;
        }
        cursor
    }

    /// Cap the number of pages this cursor will produce
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// The next page to request, or `None` once the sequence is over
    pub fn next_request_position(&self) -> Option<PageRequest> {
        if self.is_done() {
            return None;
        }
        Some(self.paginator.request(self.position.as_ref()))
    }

    /// Consume one page and return the position to resume from.
    ///
    /// `None` means there is nothing left to fetch.
    pub fn advance(&mut self, body: &Value, records_count: usize) -> Option<PagePosition> {
        if self.is_done() {
            return None;
        }
        self.pages += 1;

        match self
            .paginator
            .next(self.position.as_ref(), body, records_count)
        {
            NextPage::Done => {
                self.exhausted = true;
                self.position = None;
            }
            NextPage::Continue(next) => {
                self.position = Some(next);
                if self.pages >= self.max_pages {
                    warn!(
                        max_pages = self.max_pages,
                        position = ?self.position,
                        "Page limit reached, stopping pagination"
                    );
                    self.truncated = true;
                }
            }
        }
        self.position.clone()
    }

    /// Position of the next page to fetch
    pub fn position(&self) -> Option<&PagePosition> {
        self.position.as_ref()
    }

    /// Pages consumed so far
    pub fn pages(&self) -> u64 {
        self.pages
    }

    /// The server signalled the last page
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Stopped at the page limit with more pages available
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// No further pages will be produced
    pub fn is_done(&self) -> bool {
        self.exhausted || self.truncated
    }
}

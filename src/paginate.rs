//! Pagination over the ordered event list.

use std::ops::Range;

use crate::normalize::NormalizedEvent;

/// Default rows per page.
pub const PAGE_SIZE: usize = 10;

/// Page sizes offered by the UI.
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 20, 50, 100];

/// One page of events plus its position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventPage {
    pub events: Vec<NormalizedEvent>,
    /// 0-based, after clamping
    pub page_index: usize,
    /// 0 when there are no events
    pub total_pages: usize,
}

impl EventPage {
    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page_index > 0
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page_index + 1 < self.total_pages
    }
}

/// Clamp a requested page and compute the slice it covers.
///
/// Returns `(page_index, total_pages, range)`. A page size of 0 means
/// [`PAGE_SIZE`].
#[must_use]
pub fn page_bounds(len: usize, requested: i64, page_size: usize) -> (usize, usize, Range<usize>) {
    let size = if page_size == 0 { PAGE_SIZE } else { page_size };
    let total_pages = len.div_ceil(size);
    if total_pages == 0 {
        return (0, 0, 0..0);
    }

    let last = total_pages - 1;
    let index = usize::try_from(requested.max(0)).map_or(last, |i| i.min(last));
    let start = index * size;
    (index, total_pages, start..(start + size).min(len))
}

/// Slice `events` into the requested page.
///
/// Out-of-range requests clamp: negative to the first page, past the end
/// to the last page.
#[must_use]
pub fn paginate(events: &[NormalizedEvent], requested: i64, page_size: usize) -> EventPage {
    let (page_index, total_pages, range) = page_bounds(events.len(), requested, page_size);
    EventPage {
        events: events[range].to_vec(),
        page_index,
        total_pages,
    }
}

/// Page index state for a session.
///
/// Moves only on explicit navigation; [`Pager::reset`] on every rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pager {
    index: usize,
}

impl Pager {
    #[must_use]
    pub fn index(self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn next(&mut self, total_pages: usize) {
        if self.index + 1 < total_pages {
            self.index += 1;
        }
    }

    pub fn prev(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    /// Jump to `requested`, clamped into `[0, total_pages)`.
    pub fn jump(&mut self, requested: i64, total_pages: usize) {
        self.index = usize::try_from(requested.max(0))
            .unwrap_or(usize::MAX)
            .min(total_pages.saturating_sub(1));
    }
}

//! Windows into id-ordered lists.

/// A `limit`/`offset` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Most rows to return.
    pub limit: usize,
    /// Rows to skip before the first returned one.
    pub offset: usize,
}

impl Page {
    /// Offset of the page after this one. Saturates instead of wrapping.
    #[must_use]
    pub const fn next_offset(self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// Offset of the page before this one, clamped at zero.
    #[must_use]
    pub const fn previous_offset(self) -> usize {
        self.offset.saturating_sub(self.limit)
    }

    /// Cuts this window out of a full list.
    #[must_use]
    pub fn slice<T>(self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// One page of a filtered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    /// Rows matching the filter across all pages.
    pub total_count: usize,
    /// Rows on this page.
    pub rows: Vec<T>,
}

impl<T> Listing<T> {
    /// Pages a fully loaded list.
    #[must_use]
    pub fn paginate(rows: Vec<T>, page: Page) -> Self {
        Self {
            total_count: rows.len(),
            rows: page.slice(rows),
        }
    }

    /// Converts every row on the page, keeping the total.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Listing<U> {
        Listing {
            total_count: self.total_count,
            rows: self.rows.into_iter().map(f).collect(),
        }
    }
}

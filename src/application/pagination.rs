//! Page-number pagination for post listings.
//!
//! Listings are split into fixed-size pages addressed by `?page=N`. The
//! number is resolved leniently: anything that is not an integer falls back to
//! the first page and anything out of range falls back to the last one, so a
//! listing URL never fails because of its query string.

use serde::Deserialize;

/// Posts shown per listing page unless configured otherwise.
pub const SHOW_POSTS: u32 = 10;

/// Page numbers shown on each side of the current one in the paginator widget.
const PAGE_RANGE_RADIUS: u32 = 3;

/// Splits `count` items into pages of `per_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(count: u64, per_page: u32) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Total number of pages; an empty listing still has one (empty) page.
    pub fn num_pages(&self) -> u32 {
        let pages = self.count.div_ceil(u64::from(self.per_page)).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Resolve a raw `page` query value to a valid page number.
    pub fn resolve(&self, raw: Option<&str>) -> u32 {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return 1;
        };
        match raw.parse::<i64>() {
            Ok(number) if number >= 1 && number <= i64::from(self.num_pages()) => number as u32,
            Ok(_) => self.num_pages(),
            // Integers too wide for i64 are still out of range, not garbage.
            Err(_) if is_integer_literal(raw) => self.num_pages(),
            Err(_) => 1,
        }
    }

    /// Window of items for the given page number.
    pub fn window(&self, number: u32) -> PageWindow {
        let number = number.clamp(1, self.num_pages());
        PageWindow {
            limit: self.per_page,
            offset: u64::from(number - 1) * u64::from(self.per_page),
        }
    }

    /// Attach the fetched items to the page they belong to.
    pub fn page<T>(&self, number: u32, items: Vec<T>) -> Page<T> {
        Page {
            number: number.clamp(1, self.num_pages()),
            items,
            paginator: *self,
        }
    }
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// `LIMIT`/`OFFSET` pair handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: u32,
    pub offset: u64,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    number: u32,
    items: Vec<T>,
    paginator: Paginator,
}

impl<T> Page<T> {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self) -> u64 {
        self.paginator.count
    }

    pub fn num_pages(&self) -> u32 {
        self.paginator.num_pages()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_page_number(&self) -> Option<u32> {
        self.has_next().then_some(self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u32> {
        self.has_previous().then_some(self.number - 1)
    }

    /// 1-based index of the first item on this page (0 for an empty listing).
    pub fn start_index(&self) -> u64 {
        if self.paginator.count == 0 {
            return 0;
        }
        u64::from(self.number - 1) * u64::from(self.paginator.per_page) + 1
    }

    /// 1-based index of the last item on this page.
    pub fn end_index(&self) -> u64 {
        if self.number == self.num_pages() {
            return self.paginator.count;
        }
        u64::from(self.number) * u64::from(self.paginator.per_page)
    }

    /// Page numbers to display around the current page.
    pub fn page_range(&self) -> Vec<u32> {
        let first = self.number.saturating_sub(PAGE_RANGE_RADIUS).max(1);
        let last = (self.number + PAGE_RANGE_RADIUS).min(self.num_pages());
        (first..=last).collect()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            number: self.number,
            items: self.items.into_iter().map(f).collect(),
            paginator: self.paginator,
        }
    }
}

/// Query parameters accepted by paginated listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
}

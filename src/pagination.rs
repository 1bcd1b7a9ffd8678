use serde::{Deserialize, Serialize};
use std::num::IntErrorKind;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

/// PageQuery
///
/// The `?page=` query parameter of every listing endpoint. Kept as a raw string so that
/// malformed values reach the pager instead of being rejected by the extractor.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number. Invalid values fall back to a valid page.
    pub page: Option<String>,
}

/// Outcome of interpreting a raw `page` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requested {
    Missing,
    NotAnInteger,
    Number(i64),
    /// A syntactically valid integer that does not fit in an `i64`.
    OutOfRange,
}

fn parse_page_param(raw: Option<&str>) -> Requested {
    let Some(raw) = raw else {
        return Requested::Missing;
    };
    match raw.trim().parse::<i64>() {
        Ok(n) => Requested::Number(n),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Requested::OutOfRange,
            IntErrorKind::Empty => Requested::Missing,
            _ => Requested::NotAnInteger,
        },
    }
}

/// PageWindow
///
/// A resolved page position over a collection of `total` items: which page is shown and
/// which `offset`/`limit` slice it covers. Computing this before fetching lets the SQL
/// repository page with LIMIT/OFFSET while `paginate` slices in memory with the same rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub page_size: u64,
    pub total: u64,
}

impl PageWindow {
    /// Applies the fallback rules:
    /// missing or non-integer -> first page; below 1 or past the end -> last page.
    /// An empty collection still has one (empty) page.
    pub fn resolve(total: u64, page_param: Option<&str>, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let num_pages = total.div_ceil(page_size).max(1);

        let number = match parse_page_param(page_param) {
            Requested::Missing | Requested::NotAnInteger => 1,
            Requested::OutOfRange => num_pages,
            Requested::Number(n) if n < 1 => num_pages,
            Requested::Number(n) => (n as u64).min(num_pages),
        };

        Self {
            number,
            num_pages,
            page_size,
            total,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.page_size
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

/// Page
///
/// A bounded slice of an ordered collection plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Wraps items that were already fetched for `window` (e.g. by a LIMIT/OFFSET query).
    pub fn from_window(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total: window.total,
            has_next: window.has_next(),
            has_previous: window.has_previous(),
        }
    }

    pub fn next_page_number(&self) -> Option<u64> {
        self.has_next.then(|| self.number + 1)
    }

    pub fn previous_page_number(&self) -> Option<u64> {
        self.has_previous.then(|| self.number - 1)
    }
}

/// paginate
///
/// Cuts the requested page out of an already ordered sequence. Never fails: invalid input
/// is coerced to the nearest valid page.
pub fn paginate<T>(items: Vec<T>, page_param: Option<&str>, page_size: u64) -> Page<T> {
    let window = PageWindow::resolve(items.len() as u64, page_param, page_size);
    let slice = items
        .into_iter()
        .skip(window.offset() as usize)
        .take(window.limit() as usize)
        .collect();
    Page::from_window(slice, window)
}

//! Page window computation for paginated listings.

use serde::{Deserialize, Serialize};

/// Largest rank offset a range query accepts.
const MAX_RANK: u64 = i64::MAX as u64;

fn rank(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Clamped offsets and neighbours for one page of a listing.
///
/// `start` and `stop` are inclusive rank offsets suitable for a descending range query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub start: i64,
    pub stop: i64,
    pub page: u64,
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub last: u64,
}

impl PageWindow {
    /// Compute the window for `requested_page` over `total_count` items.
    ///
    /// Out-of-range pages are clamped into `1..=last`; an empty listing yields page 1 with
    /// no neighbours. A `per_page` of 0 is treated as 1. Offsets saturate at `i64::MAX`.
    pub fn compute(total_count: u64, per_page: u64, requested_page: i64) -> Self {
        let per_page = per_page.clamp(1, MAX_RANK);
        let last = total_count.div_ceil(per_page);

        let page = u64::try_from(requested_page).unwrap_or(1).min(last).max(1);

        let start = rank((page - 1).saturating_mul(per_page));
        let stop = rank(page.saturating_mul(per_page).saturating_sub(1));

        let next = page.checked_add(1).filter(|next| *next <= last);
        let previous = Some(page - 1).filter(|previous| *previous >= 1);

        Self {
            start,
            stop,
            page,
            next,
            previous,
            last,
        }
    }

    /// True when the window cannot contain any item.
    pub fn is_empty(&self) -> bool {
        self.last == 0
    }
}

use serde::{Deserialize, Serialize};

/// Pagination metadata attached to every list collection.
///
/// The invariants `total_pages == max(1, ceil(total / limit))`,
/// `has_next == page < total_pages` and `has_prev == page > 1` are
/// re-established by [`recompute_after_insertion`] and
/// [`recompute_after_removal`], which are the only functions call sites
/// may use to adjust pagination after a local add or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// Build pagination for the first page of an empty collection.
    pub fn empty(limit: u32) -> Self {
        recompute(
            &Pagination {
                page: 1,
                limit,
                total: 0,
                total_pages: 1,
                has_next: false,
                has_prev: false,
            },
            0,
        )
    }

    /// The current page no longer exists after removals; the caller
    /// should refetch with a valid page.
    pub fn page_out_of_range(&self) -> bool {
        self.page > self.total_pages
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::empty(20)
    }
}

fn recompute(previous: &Pagination, total: u64) -> Pagination {
    let limit = u64::from(previous.limit.max(1));
    let total_pages = (total.div_ceil(limit)).max(1) as u32;
    Pagination {
        page: previous.page,
        limit: previous.limit,
        total,
        total_pages,
        has_next: previous.page < total_pages,
        has_prev: previous.page > 1,
    }
}

/// Recompute pagination after `inserted` entities were added locally.
pub fn recompute_after_insertion(previous: &Pagination, inserted: u64) -> Pagination {
    recompute(previous, previous.total.saturating_add(inserted))
}

/// Recompute pagination after `removed` entities were removed locally.
///
/// `page` is deliberately not clamped; a page that drifted out of range
/// is reported via [`Pagination::page_out_of_range`] so the caller can
/// refetch instead of silently showing a different page.
pub fn recompute_after_removal(previous: &Pagination, removed: u64) -> Pagination {
    recompute(previous, previous.total.saturating_sub(removed))
}

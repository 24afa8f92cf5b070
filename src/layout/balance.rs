//! # Column Balancing
//!
//! A multi-column section that ends mid-page leaves its content stacked in
//! the first column(s). Balancing redistributes the fragments of the final
//! region on the last page so the columns end at roughly the same height.
//! Fragments are moved whole; nothing is re-split.
//!
//! Balancing is skipped when the region already uses more than one column:
//! explicit column breaks mean the author chose the distribution.

use super::paginator::RegionInfo;
use super::Page;

/// Position tolerance when matching fragments to the region.
const EPSILON: f64 = 0.5;

/// Balance the final column region of `page`. Only fragments accepted by
/// `include` take part. Returns true if anything moved.
pub fn balance_page<F>(page: &mut Page, region: &RegionInfo, include: F) -> bool
where
    F: Fn(&str) -> bool,
{
    let columns = &region.columns;
    if !columns.is_multi() {
        return false;
    }

    let candidates: Vec<usize> = page
        .fragments
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_anchored() && f.y() >= region.top - EPSILON && include(f.block_id()))
        .map(|(i, _)| i)
        .collect();

    if candidates.len() < 2 {
        return false;
    }

    let used: Vec<Option<usize>> = candidates
        .iter()
        .map(|&i| columns.column_at(page.fragments[i].x() - region.content_left))
        .collect();
    if used.iter().any(|c| *c != Some(0)) {
        log::debug!(
            "page {}: content already spans columns, not balancing",
            page.number
        );
        return false;
    }

    let total = candidates
        .iter()
        .map(|&i| page.fragments[i].bottom())
        .fold(region.top, f64::max)
        - region.top;
    if total <= 0.0 {
        return false;
    }
    let target = total / columns.count as f64;

    // Greedy fill: start a new column once the current one would pass the
    // target, keeping at least one fragment per column.
    let mut column = 0;
    let mut column_start = region.top;
    let mut column_items = 0;
    let mut moved = false;
    let origin = region.content_left + columns.offset(0);

    for &i in &candidates {
        let (y, bottom) = {
            let f = &page.fragments[i];
            (f.y(), f.bottom())
        };
        if column_items > 0
            && column + 1 < columns.count
            && bottom - column_start > target + EPSILON
        {
            column += 1;
            column_start = y;
            column_items = 0;
        }
        column_items += 1;

        if column == 0 {
            continue;
        }
        let dx = region.content_left + columns.offset(column) - origin;
        let dy = region.top - column_start;
        let width = columns.column_width(column);
        let fragment = &mut page.fragments[i];
        fragment.translate(dx, dy);
        if fragment.width() > width {
            fragment.set_width(width);
        }
        moved = true;
    }

    if moved {
        log::debug!(
            "page {}: balanced {} fragment(s) over {} columns (target height {:.1})",
            page.number,
            candidates.len(),
            column + 1,
            target
        );
    }
    moved
}

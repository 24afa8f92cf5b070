//! Vertical alignment of page content within the section's base margins.
//!
//! Runs after pagination. Header/footer inflation is ignored: the content
//! area is the one the section declared. Every fragment on the page moves by
//! the same offset, so floating objects stay with the text they belong to.

use crate::model::VerticalAlign;

use super::Page;

/// Shift the fragments of `page` for its section's vertical alignment. `page_height` is the page's own height. Returns the offset
/// applied, if any.
pub fn align_page(page: &mut Page, page_height: f64) -> Option<f64> {
    let align = page.vertical_align?;
    let base = page.base_margins?;
    if align == VerticalAlign::Top {
        return None;
    }

    let (min_y, max_y) = page
        .fragments
        .iter()
        .fold(None, |acc: Option<(f64, f64)>, f| {
            let (lo, hi) = acc.unwrap_or((f.y(), f.bottom()));
            Some((lo.min(f.y()), hi.max(f.bottom())))
        })?;

    let area_top = base.top;
    let area_height = page_height - base.vertical();
    let free = area_height - (max_y - min_y);
    if free <= 0.0 {
        return None;
    }

    // Justified ("both") alignment has no inter-line stretching here and
    // is placed like center.
    let target = match align {
        VerticalAlign::Center | VerticalAlign::Both => area_top + free / 2.0,
        VerticalAlign::Bottom => area_top + free,
        VerticalAlign::Top => return None,
    };
    let shift = target - min_y;
    if shift <= 0.0 {
        return None;
    }

    for fragment in page.fragments.iter_mut() {
        fragment.translate(0.0, shift);
    }
    log::debug!(
        "page {}: {:?} vertical alignment shifted content by {:.2}",
        page.number,
        align,
        shift
    );
    Some(shift)
}

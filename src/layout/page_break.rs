//! # Split Decisions
//!
//! Decides how much of a paragraph (by lines) or table (by rows) goes into
//! the space left in the current column. Widow and orphan control live
//! here: a split never strands fewer than `min_head` lines at the bottom of
//! a column or fewer than `min_tail` lines at the top of the next one.

use crate::model::ParagraphAttrs;

/// Slack for floating-point noise when comparing heights against space.
pub const FIT_EPSILON: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDecision {
    /// Everything fits in the remaining space.
    PlaceAll,
    /// Nothing goes here; continue in the next column or page.
    MoveToNextColumn,
    /// Place the first `items_here` items, continue with the rest.
    Split { items_here: usize },
}

/// Constraints on where a block may be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRule {
    /// Never split unless the block cannot fit even on an empty column.
    pub keep_together: bool,
    pub min_head: usize,
    pub min_tail: usize,
}

impl SplitRule {
    pub fn for_paragraph(attrs: &ParagraphAttrs) -> Self {
        let min = if attrs.widow_control { 2 } else { 1 };
        Self {
            keep_together: attrs.keep_lines,
            min_head: min,
            min_tail: min,
        }
    }

    pub fn for_table_rows() -> Self {
        Self {
            keep_together: false,
            min_head: 1,
            min_tail: 1,
        }
    }
}

/// How many leading items fit in `remaining`.
pub fn count_fitting(remaining: f64, heights: &[f64]) -> usize {
    let mut used = 0.0;
    let mut count = 0;
    for &h in heights {
        if used + h > remaining + FIT_EPSILON {
            break;
        }
        used += h;
        count += 1;
    }
    count
}

/// Decide how to place `heights` into `remaining`.
///
/// `at_column_top` means an empty column starting at the top of the page:
/// moving on would not gain any space, so at least one item is always
/// placed.
pub fn decide_split(
    remaining: f64,
    heights: &[f64],
    rule: SplitRule,
    at_column_top: bool,
) -> SplitDecision {
    let total: f64 = heights.iter().sum();
    if total <= remaining + FIT_EPSILON {
        return SplitDecision::PlaceAll;
    }

    let n = heights.len();
    let fit = count_fitting(remaining, heights);

    if at_column_top {
        let tail = n - fit.max(1);
        let here = if tail > 0 && tail < rule.min_tail {
            fit.saturating_sub(rule.min_tail - tail).max(1)
        } else {
            fit.max(1)
        };
        return if here >= n {
            SplitDecision::PlaceAll
        } else {
            SplitDecision::Split { items_here: here }
        };
    }

    if rule.keep_together || fit == 0 {
        return SplitDecision::MoveToNextColumn;
    }

    // Orphan: too few items would start here.
    if fit < rule.min_head.min(n) {
        return SplitDecision::MoveToNextColumn;
    }

    // Widow: too few items would be left for the next column.
    let tail = n - fit;
    if tail < rule.min_tail {
        let pulled_back = fit.saturating_sub(rule.min_tail - tail);
        if pulled_back == 0 || pulled_back < rule.min_head.min(n) {
            return SplitDecision::MoveToNextColumn;
        }
        return SplitDecision::Split {
            items_here: pulled_back,
        };
    }

    SplitDecision::Split { items_here: fit }
}

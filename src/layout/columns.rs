//! # Column Geometry
//!
//! Turns a section's `{count, gap, widths}` into concrete column boxes for a
//! given content width. Importers hand us whatever the source document
//! said, including gaps wider than the page and zero-column sections, so
//! normalization never fails: it falls back to a single full-width column.

use serde::Serialize;

use crate::model::ColumnLayout;

/// Narrowest column we are willing to lay out into.
pub const MIN_COLUMN_WIDTH: f64 = 0.0001;

/// Resolved column boxes, relative to the left edge of the content area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedColumns {
    pub count: usize,
    pub gap: f64,
    /// Width of the first column (all columns when they are equal).
    pub width: f64,
    pub widths: Vec<f64>,
}

impl NormalizedColumns {
    fn single(content_width: f64) -> Self {
        let width = content_width.max(0.0);
        Self {
            count: 1,
            gap: 0.0,
            width,
            widths: vec![width],
        }
    }

    /// Offset of column `index` from the left content edge. Indices past the
    /// last column clamp to the last column.
    pub fn offset(&self, index: usize) -> f64 {
        let index = index.min(self.count - 1);
        self.widths[..index].iter().sum::<f64>() + self.gap * index as f64
    }

    pub fn column_width(&self, index: usize) -> f64 {
        self.widths[index.min(self.count - 1)]
    }

    pub fn is_multi(&self) -> bool {
        self.count > 1
    }

    /// Index of the column whose box contains `x` (relative to the content
    /// left edge), if any.
    pub fn column_at(&self, x: f64) -> Option<usize> {
        (0..self.count).find(|&i| {
            let start = self.offset(i);
            x >= start - 0.5 && x < start + self.widths[i] + 0.5
        })
    }
}

/// Normalize a column configuration against the available content width.
pub fn normalize_columns(columns: &ColumnLayout, content_width: f64) -> NormalizedColumns {
    let count = columns.count.max(1) as usize;
    let gap = if columns.gap.is_finite() {
        columns.gap.max(0.0)
    } else {
        0.0
    };

    if count == 1 {
        return NormalizedColumns::single(content_width);
    }

    let total_gap = gap * (count - 1) as f64;

    if columns.widths.len() == count && columns.widths.iter().all(|w| *w > MIN_COLUMN_WIDTH) {
        let sum: f64 = columns.widths.iter().sum();
        if sum + total_gap <= content_width + 0.5 {
            return NormalizedColumns {
                count,
                gap,
                width: columns.widths[0],
                widths: columns.widths.clone(),
            };
        }
    }

    let width = (content_width - total_gap) / count as f64;
    if !width.is_finite() || width < MIN_COLUMN_WIDTH {
        log::warn!(
            "collapsing {} columns with gap {} into one: content width {} is too narrow",
            count,
            gap,
            content_width
        );
        return NormalizedColumns::single(content_width);
    }

    NormalizedColumns {
        count,
        gap,
        width,
        widths: vec![width; count],
    }
}

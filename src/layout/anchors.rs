//! # Anchored Objects
//!
//! Floating images, drawings and tables are not laid out where they appear
//! in the block list. Paragraph-relative ones travel with the nearest
//! paragraph (the preceding one, or the following one when nothing
//! precedes them); page-relative ones get their position up front from the
//! document's base page geometry.

use std::collections::{HashMap, HashSet};

use crate::model::*;

/// Resolved top-left corner of a floating object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPosition {
    pub x: f64,
    pub y: f64,
}

/// Which paragraph owns which floating object, and where page-relative
/// objects go.
#[derive(Debug, Clone, Default)]
pub struct AnchorPlan {
    by_paragraph: HashMap<usize, Vec<usize>>,
    owned: HashSet<usize>,
    page_relative: HashMap<usize, AnchorPosition>,
}

impl AnchorPlan {
    /// Floating blocks placed together with paragraph `index`, in order.
    pub fn owned_by(&self, index: usize) -> &[usize] {
        self.by_paragraph
            .get(&index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Placed with a paragraph, so the main pass skips it.
    pub fn is_owned(&self, index: usize) -> bool {
        self.owned.contains(&index)
    }

    pub fn page_relative(&self, index: usize) -> Option<AnchorPosition> {
        self.page_relative.get(&index).copied()
    }
}

/// Extent along one axis of the box an anchor is relative to.
#[derive(Debug, Clone, Copy)]
pub struct AxisBox {
    pub start: f64,
    pub extent: f64,
}

enum AxisAlign {
    Start,
    Center,
    End,
}

fn place_on_axis(frame: AxisBox, size: f64, align: Option<AxisAlign>, offset: f64) -> f64 {
    match align {
        Some(AxisAlign::Start) => frame.start,
        Some(AxisAlign::Center) => frame.start + (frame.extent - size) / 2.0,
        Some(AxisAlign::End) => frame.start + frame.extent - size,
        None => frame.start + offset,
    }
}

/// Horizontal position of an object `width` wide inside `frame`.
pub fn resolve_x(anchor: &Anchor, frame: AxisBox, width: f64) -> f64 {
    let align = anchor.align_h.map(|a| match a {
        HAlign::Left => AxisAlign::Start,
        HAlign::Center => AxisAlign::Center,
        HAlign::Right => AxisAlign::End,
    });
    place_on_axis(frame, width, align, anchor.offset_h)
}

/// Vertical position of an object `height` tall inside `frame`.
pub fn resolve_y(anchor: &Anchor, frame: AxisBox, height: f64) -> f64 {
    let align = anchor.align_v.map(|a| match a {
        VAlign::Top => AxisAlign::Start,
        VAlign::Center => AxisAlign::Center,
        VAlign::Bottom => AxisAlign::End,
    });
    place_on_axis(frame, height, align, anchor.offset_v)
}

/// Width and height of a floating block, if its measure has the right kind.
pub fn floating_size(block: &FlowBlock, measure: &Measure) -> Option<(f64, f64)> {
    match (block, measure) {
        (FlowBlock::Image(_), Measure::Image(m)) | (FlowBlock::Drawing(_), Measure::Drawing(m)) => {
            Some((m.width, m.height))
        }
        (FlowBlock::Table(_), Measure::Table(m)) => Some((m.width, m.height)),
        _ => None,
    }
}

/// Build the anchor plan for a document.
///
/// `x_rebase` is subtracted from page-relative horizontal positions; header
/// and footer passes lay out in a box that starts at the left margin.
pub fn plan_anchors(
    blocks: &[FlowBlock],
    measures: &[Measure],
    options: &LayoutOptions,
    x_rebase: f64,
) -> AnchorPlan {
    let mut plan = AnchorPlan::default();
    let mut last_paragraph: Option<usize> = None;
    let mut waiting: Vec<usize> = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        match block {
            FlowBlock::Paragraph(_) => {
                if !waiting.is_empty() {
                    plan.by_paragraph
                        .entry(index)
                        .or_default()
                        .append(&mut waiting);
                }
                last_paragraph = Some(index);
            }
            FlowBlock::SectionBreak(_) => {
                last_paragraph = None;
            }
            _ => {}
        }

        let Some(anchor) = block.anchor() else {
            continue;
        };

        if anchor.is_page_relative() {
            if let Some((width, height)) = measures.get(index).and_then(|m| floating_size(block, m)) {
                let position = page_relative_position(anchor, options, width, height, x_rebase);
                plan.page_relative.insert(index, position);
            }
            continue;
        }

        match last_paragraph {
            Some(owner) => plan.by_paragraph.entry(owner).or_default().push(index),
            None => waiting.push(index),
        }
    }

    for indices in plan.by_paragraph.values() {
        plan.owned.extend(indices.iter().copied());
    }
    if !waiting.is_empty() {
        log::debug!(
            "{} floating object(s) have no paragraph to anchor to",
            waiting.len()
        );
    }
    plan
}

fn page_relative_position(
    anchor: &Anchor,
    options: &LayoutOptions,
    width: f64,
    height: f64,
    x_rebase: f64,
) -> AnchorPosition {
    let page = options.page_size;
    let margins = options.margins;
    let h_frame = match anchor.h_relative_from {
        HRelativeFrom::Page => AxisBox {
            start: 0.0,
            extent: page.width,
        },
        HRelativeFrom::Margin | HRelativeFrom::Column => AxisBox {
            start: margins.left,
            extent: page.width - margins.horizontal(),
        },
    };
    let x = resolve_x(anchor, h_frame, width);
    let x = if anchor.h_relative_from == HRelativeFrom::Page {
        x - x_rebase
    } else {
        x
    };
    let y = resolve_y(
        anchor,
        AxisBox {
            start: 0.0,
            extent: page.height,
        },
        height,
    );
    AnchorPosition { x, y }
}

//! # Keep-With-Next Chains
//!
//! Consecutive paragraphs marked "keep with next" must land on the same page
//! as each other and as the first line of whatever follows them. The chain
//! structure is resolved once per document with a single forward scan; the
//! height a chain needs is computed when the driver reaches its first
//! paragraph, so measure validation stays per block.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::Result;
use crate::model::*;

use super::paragraph_measure;

/// A maximal run of keep-with-next paragraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepNextChain {
    pub start_index: usize,
    pub end_index: usize,
    pub member_indices: Vec<usize>,
    /// Block whose first line must fit with the chain. `None` when the chain
    /// runs into an explicit break or the end of the document.
    pub anchor_index: Option<usize>,
}

/// All chains of a document, indexed for the driver.
#[derive(Debug, Clone, Default)]
pub struct KeepNextChains {
    chains: Vec<KeepNextChain>,
    by_start: HashMap<usize, usize>,
    members: HashSet<usize>,
}

impl KeepNextChains {
    pub fn chains(&self) -> &[KeepNextChain] {
        &self.chains
    }

    pub fn starting_at(&self, index: usize) -> Option<&KeepNextChain> {
        self.by_start.get(&index).map(|&i| &self.chains[i])
    }

    /// A chain member other than the first: its chain already decided.
    pub fn is_mid_chain(&self, index: usize) -> bool {
        self.members.contains(&index) && !self.by_start.contains_key(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }
}

fn keeps_with_next(block: &FlowBlock) -> bool {
    matches!(block, FlowBlock::Paragraph(p) if p.attrs.keep_next)
}

/// Scan the document for keep-with-next chains.
pub fn resolve_keep_next_chains(blocks: &[FlowBlock]) -> KeepNextChains {
    let mut result = KeepNextChains::default();
    let mut i = 0;

    while i < blocks.len() {
        if !keeps_with_next(&blocks[i]) {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        while end + 1 < blocks.len() && keeps_with_next(&blocks[end + 1]) {
            end += 1;
        }
        let members: Vec<usize> = (start..=end).collect();

        let anchor = blocks
            .get(end + 1)
            .filter(|b| !b.is_break())
            .map(|_| end + 1);

        if anchor.is_some() || members.len() > 1 {
            result.by_start.insert(start, result.chains.len());
            result.members.extend(members.iter().copied());
            result.chains.push(KeepNextChain {
                start_index: start,
                end_index: end,
                member_indices: members,
                anchor_index: anchor,
            });
        }

        i = end + 1;
    }

    result
}

fn same_style(a: &ParagraphAttrs, b: &ParagraphAttrs) -> bool {
    a.style_id == b.style_id
}

/// Space after `prev`, suppressed by contextual spacing against `next`.
pub fn effective_spacing_after(prev: &ParagraphAttrs, next: Option<&ParagraphAttrs>) -> f64 {
    match next {
        Some(next) if prev.contextual_spacing && same_style(prev, next) => 0.0,
        _ => prev.spacing.after,
    }
}

/// Space before `next`, suppressed by contextual spacing against `prev`.
pub fn effective_spacing_before(next: &ParagraphAttrs, prev: Option<&ParagraphAttrs>) -> f64 {
    match prev {
        Some(prev) if next.contextual_spacing && same_style(prev, next) => 0.0,
        _ => next.spacing.before,
    }
}

/// Collapsed gap between two adjacent paragraphs: the larger of the
/// effective space after the first and before the second.
pub fn collapsed_gap(prev: &ParagraphAttrs, next: &ParagraphAttrs) -> f64 {
    effective_spacing_after(prev, Some(next)).max(effective_spacing_before(next, Some(prev)))
}

/// Height the chain needs on one page: member contents, the collapsed gaps
/// between them, the gap to the anchor, and only the anchor's first line.
pub fn chain_required_height(
    chain: &KeepNextChain,
    blocks: &[FlowBlock],
    measures: &[Measure],
) -> Result<f64> {
    let mut height = 0.0;
    let mut previous: Option<&ParagraphAttrs> = None;

    for &index in &chain.member_indices {
        let FlowBlock::Paragraph(block) = &blocks[index] else {
            continue;
        };
        let measure = paragraph_measure(blocks, measures, index)?;
        if let Some(prev) = previous {
            height += collapsed_gap(prev, &block.attrs);
        }
        height += measure.content_height();
        previous = Some(&block.attrs);
    }

    let Some(anchor) = chain.anchor_index else {
        return Ok(height);
    };

    let last = previous;
    match (&blocks[anchor], &measures[anchor]) {
        (FlowBlock::Paragraph(next), _) => {
            let measure = paragraph_measure(blocks, measures, anchor)?;
            if let Some(prev) = last {
                height += collapsed_gap(prev, &next.attrs);
            }
            height += measure.first_line_height();
        }
        (FlowBlock::Table(table), Measure::Table(m)) if table.anchor.is_none() => {
            height += last.map(|p| p.spacing.after).unwrap_or(0.0);
            height += m.first_row_height();
        }
        (FlowBlock::Image(b), Measure::Image(m)) if b.anchor.is_none() => {
            height += last.map(|p| p.spacing.after).unwrap_or(0.0);
            height += m.height;
        }
        (FlowBlock::Drawing(b), Measure::Drawing(m)) if b.anchor.is_none() => {
            height += last.map(|p| p.spacing.after).unwrap_or(0.0);
            height += m.height;
        }
        // Floating anchors take no room in the flow. Mismatched measures
        // are reported when the driver reaches the anchor block itself.
        _ => {}
    }

    Ok(height)
}

//! # Pagination Engine
//!
//! Turns measured flow blocks into pages of positioned fragments.
//!
//! Nothing here measures text. Every block arrives with a [`Measure`]
//! (line heights, table row heights, image boxes) computed by the caller,
//! and the engine's job is purely to decide *where* each piece goes:
//!
//! 1. Walk the blocks in reading order, one pass, never backtracking.
//! 2. Before placing a block, ask whether it fits in the space left in the
//!    current column. Keep-with-next chains ask the question for the whole
//!    chain up front.
//! 3. If it fits, place it and advance the cursor.
//! 4. If it doesn't, split it at a line (paragraphs) or row (tables)
//!    boundary that respects widow/orphan rules, and continue in the next
//!    column or page. Table header rows repeat on every continuation.
//! 5. Section breaks never mutate the page being filled: their properties
//!    wait in a pending slot until the paginator opens the next page.
//!
//! After the pass, trailing empty pages are trimmed, vertically aligned
//! sections are shifted, and the final multi-column region is balanced.

pub mod anchors;
pub mod balance;
pub mod columns;
pub mod floats;
pub mod keep_next;
pub mod page_break;
pub mod paginator;
pub mod section;
pub mod vertical_align;

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Serialize;

use crate::error::{FolioError, Result};
use crate::model::*;

use anchors::{floating_size, plan_anchors, resolve_x, resolve_y, AnchorPlan, AxisBox};
use columns::normalize_columns;
use floats::{FloatManager, Rect};
use keep_next::{chain_required_height, collapsed_gap, resolve_keep_next_chains, KeepNextChain, KeepNextChains};
use page_break::{decide_split, SplitDecision, SplitRule, FIT_EPSILON};
use paginator::{ConstraintBoundary, PageState, Paginator, RegionInfo};
use section::{
    build_section_lookahead, effective_section_block, resolve_section_props,
    resolved_section_index, schedule_section_break, Parity, SectionProps, SectionRefs,
    SectionState,
};

// ── Output ──────────────────────────────────────────────────────

/// A slice of a paragraph: lines `[from_line, to_line)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParaFragment {
    pub block_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub from_line: usize,
    pub to_line: usize,
    pub continues_from_prev: bool,
    pub continues_on_next: bool,
}

/// A paragraph slice that carries a list marker.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemFragment {
    #[serde(flatten)]
    pub para: ParaFragment,
    pub marker_width: f64,
    /// Only the first slice of an item shows its marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFragment {
    pub block_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub is_anchored: bool,
    pub behind_doc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingFragment {
    pub block_id: String,
    pub drawing_kind: DrawingKind,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub is_anchored: bool,
    pub behind_doc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
}

/// A slice of a table: body rows `[from_row, to_row)`, preceded by
/// `repeat_header_rows` repeated header rows on continuations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFragment {
    pub block_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub from_row: usize,
    pub to_row: usize,
    pub repeat_header_rows: usize,
    pub continues_from_prev: bool,
    pub continues_on_next: bool,
    pub is_anchored: bool,
}

/// A positioned piece of a block on one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Fragment {
    Para(ParaFragment),
    ListItem(ListItemFragment),
    Image(ImageFragment),
    Drawing(DrawingFragment),
    Table(TableFragment),
}

impl Fragment {
    pub fn block_id(&self) -> &str {
        match self {
            Fragment::Para(f) => &f.block_id,
            Fragment::ListItem(f) => &f.para.block_id,
            Fragment::Image(f) => &f.block_id,
            Fragment::Drawing(f) => &f.block_id,
            Fragment::Table(f) => &f.block_id,
        }
    }

    pub fn rect(&self) -> Rect {
        match self {
            Fragment::Para(f) => Rect::new(f.x, f.y, f.width, f.height),
            Fragment::ListItem(f) => Rect::new(f.para.x, f.para.y, f.para.width, f.para.height),
            Fragment::Image(f) => Rect::new(f.x, f.y, f.width, f.height),
            Fragment::Drawing(f) => Rect::new(f.x, f.y, f.width, f.height),
            Fragment::Table(f) => Rect::new(f.x, f.y, f.width, f.height),
        }
    }

    pub fn x(&self) -> f64 {
        self.rect().x
    }

    pub fn y(&self) -> f64 {
        self.rect().y
    }

    pub fn width(&self) -> f64 {
        self.rect().width
    }

    pub fn height(&self) -> f64 {
        self.rect().height
    }

    pub fn bottom(&self) -> f64 {
        self.rect().bottom()
    }

    /// Floating objects positioned by their anchor rather than the flow.
    pub fn is_anchored(&self) -> bool {
        match self {
            Fragment::Image(f) => f.is_anchored,
            Fragment::Drawing(f) => f.is_anchored,
            Fragment::Table(f) => f.is_anchored,
            Fragment::Para(_) | Fragment::ListItem(_) => false,
        }
    }

    pub fn behind_doc(&self) -> bool {
        match self {
            Fragment::Image(f) => f.behind_doc,
            Fragment::Drawing(f) => f.behind_doc,
            _ => false,
        }
    }

    fn position_mut(&mut self) -> (&mut f64, &mut f64, &mut f64) {
        match self {
            Fragment::Para(f) => (&mut f.x, &mut f.y, &mut f.width),
            Fragment::ListItem(f) => (&mut f.para.x, &mut f.para.y, &mut f.para.width),
            Fragment::Image(f) => (&mut f.x, &mut f.y, &mut f.width),
            Fragment::Drawing(f) => (&mut f.x, &mut f.y, &mut f.width),
            Fragment::Table(f) => (&mut f.x, &mut f.y, &mut f.width),
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        let (x, y, _) = self.position_mut();
        *x += dx;
        *y += dy;
    }

    pub fn set_width(&mut self, width: f64) {
        let (_, _, w) = self.position_mut();
        *w = width;
    }
}

/// A laid-out page.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based physical page number.
    pub number: u32,
    /// In paint order.
    pub fragments: Vec<Fragment>,
    /// Margins in effect after header/footer inflation.
    pub margins: PageMargins,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<PageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<VerticalAlign>,
    /// Section margins before inflation. Present with `vertical_align`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_margins: Option<PageMargins>,
    /// Display page number, formatted per the section's numbering.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_index: Option<usize>,
    pub section_refs: SectionRefs,
    /// Columns the page opened with.
    pub columns: ColumnLayout,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraint_boundaries: Vec<ConstraintBoundary>,
    /// Last column region on the page (internal use).
    #[serde(skip)]
    pub(crate) region: Option<RegionInfo>,
}

/// Result of laying out a document body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub page_size: PageSize,
    pub pages: Vec<Page>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<ColumnLayout>,
}

/// Result of laying out one header or footer.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFooterLayout {
    pub pages: Vec<Page>,
    /// Content height, `max_y - min_y` over fragments that take up room.
    pub height: f64,
    pub min_y: f64,
    pub max_y: f64,
}

// ── Engine ──────────────────────────────────────────────────────

/// Re-measures a paragraph at a narrower width when floating objects
/// squeeze the column. Returning `None` keeps the original measure.
pub trait ParagraphRemeasurer {
    fn remeasure(&self, block: &ParagraphBlock, max_width: f64) -> Option<ParagraphMeasure>;
}

impl<F> ParagraphRemeasurer for F
where
    F: Fn(&ParagraphBlock, f64) -> Option<ParagraphMeasure>,
{
    fn remeasure(&self, block: &ParagraphBlock, max_width: f64) -> Option<ParagraphMeasure> {
        self(block, max_width)
    }
}

/// The pagination engine.
#[derive(Default)]
pub struct LayoutEngine {
    remeasurer: Option<Box<dyn ParagraphRemeasurer>>,
}

impl LayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remeasurer(mut self, remeasurer: Box<dyn ParagraphRemeasurer>) -> Self {
        self.remeasurer = Some(remeasurer);
        self
    }

    /// Lay out a document body into pages.
    pub fn layout_document(
        &self,
        blocks: &[FlowBlock],
        measures: &[Measure],
        options: &LayoutOptions,
    ) -> Result<Layout> {
        check_lengths(blocks, measures)?;

        let mut pass = LayoutPass::new(self, blocks, measures, options, 0.0);
        pass.run()?;
        let pages = pass.finish(true);

        log::debug!("laid out {} block(s) into {} page(s)", blocks.len(), pages.len());
        Ok(Layout {
            page_size: options.page_size,
            pages,
            columns: (options.columns.count > 1).then(|| options.columns.clone()),
        })
    }

    /// Lay out header or footer content inside a fixed box. A box with no
    /// height yields an empty layout.
    pub fn layout_header_footer(
        &self,
        blocks: &[FlowBlock],
        measures: &[Measure],
        constraints: &HeaderFooterConstraints,
    ) -> Result<HeaderFooterLayout> {
        check_lengths(blocks, measures)?;
        if constraints.height <= 0.0 || !constraints.height.is_finite() {
            log::debug!("header/footer box has no height; nothing to lay out");
            return Ok(HeaderFooterLayout::default());
        }

        let options = LayoutOptions {
            page_size: PageSize::new(constraints.width.max(0.0), constraints.height),
            margins: PageMargins::uniform(0.0),
            columns: ColumnLayout::single(),
            ..Default::default()
        };
        let mut pass = LayoutPass::new(self, blocks, measures, &options, constraints.margin_left);
        pass.run()?;
        let pages = pass.finish(false);

        let extent = pages
            .iter()
            .flat_map(|p| p.fragments.iter())
            .filter(|f| !f.behind_doc())
            .fold(None, |acc: Option<(f64, f64)>, f| {
                let (lo, hi) = acc.unwrap_or((f.y(), f.bottom()));
                Some((lo.min(f.y()), hi.max(f.bottom())))
            });
        let (min_y, max_y) = extent.unwrap_or((0.0, 0.0));

        Ok(HeaderFooterLayout {
            pages,
            height: (max_y - min_y).max(0.0),
            min_y,
            max_y,
        })
    }
}

/// Box a caller should measure content against: the widest column and the
/// tallest content area of any section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementConstraints {
    pub measurement_width: f64,
    pub measurement_height: f64,
}

/// Measurement box for a document, before any layout. Section breaks in
/// `blocks` contribute their own page size, margins and columns.
pub fn resolve_measurement_constraints(
    options: &LayoutOptions,
    blocks: &[FlowBlock],
) -> MeasurementConstraints {
    let mut props = SectionProps::from_options(options);
    let mut constraints = section_measurement(&props);

    for block in blocks {
        let FlowBlock::SectionBreak(section) = block else {
            continue;
        };
        props = resolve_section_props(section, None, &props);
        let next = section_measurement(&props);
        constraints.measurement_width = constraints.measurement_width.max(next.measurement_width);
        constraints.measurement_height = constraints.measurement_height.max(next.measurement_height);
    }
    constraints
}

fn section_measurement(props: &SectionProps) -> MeasurementConstraints {
    let content_width = (props.page_size.width - props.margins.horizontal()).max(0.0);
    let columns = normalize_columns(&props.columns, content_width);
    MeasurementConstraints {
        measurement_width: columns.widths.iter().copied().fold(0.0, f64::max),
        measurement_height: (props.page_size.height - props.margins.vertical()).max(0.0),
    }
}

fn check_lengths(blocks: &[FlowBlock], measures: &[Measure]) -> Result<()> {
    if blocks.len() != measures.len() {
        return Err(FolioError::MeasureCountMismatch {
            blocks: blocks.len(),
            measures: measures.len(),
        });
    }
    Ok(())
}

fn kind_mismatch(blocks: &[FlowBlock], measures: &[Measure], index: usize) -> FolioError {
    FolioError::MeasureKindMismatch {
        index,
        block_id: blocks[index].id().to_string(),
        expected: blocks[index].kind_name(),
        found: measures[index].kind_name(),
    }
}

/// The paragraph measure for block `index`, or a kind mismatch error.
pub(crate) fn paragraph_measure<'m>(
    blocks: &[FlowBlock],
    measures: &'m [Measure],
    index: usize,
) -> Result<&'m ParagraphMeasure> {
    match (&blocks[index], &measures[index]) {
        (FlowBlock::Paragraph(_), Measure::Paragraph(m)) => Ok(m),
        _ => Err(kind_mismatch(blocks, measures, index)),
    }
}

fn table_measure<'m>(
    blocks: &[FlowBlock],
    measures: &'m [Measure],
    index: usize,
) -> Result<&'m TableMeasure> {
    match (&blocks[index], &measures[index]) {
        (FlowBlock::Table(_), Measure::Table(m)) => Ok(m),
        _ => Err(kind_mismatch(blocks, measures, index)),
    }
}

/// Gap to add above a paragraph given what the column already holds.
/// Negative when contextual spacing takes back trailing space that was
/// already added to the cursor.
fn leading_gap(state: &PageState, attrs: &ParagraphAttrs) -> f64 {
    match &state.last_paragraph {
        Some(prev) => collapsed_gap(prev, attrs) - state.trailing_spacing,
        None => attrs.spacing.before,
    }
}

/// Vertical extent of a placed paragraph on its last page.
#[derive(Debug, Clone, Copy)]
struct ParagraphSpan {
    top: f64,
    bottom: f64,
}

/// State for one layout call. Nothing survives between calls.
struct LayoutPass<'a> {
    engine: &'a LayoutEngine,
    blocks: &'a [FlowBlock],
    measures: &'a [Measure],
    options: &'a LayoutOptions,
    paginator: Paginator<'a>,
    floats: FloatManager,
    chains: KeepNextChains,
    anchors: AnchorPlan,
    lookahead: HashMap<usize, usize>,
    /// Page-relative x positions are shifted left by this much.
    x_rebase: f64,
    seen_section_break: bool,
    /// Section the blocks currently being placed belong to.
    section_index: usize,
    block_sections: HashMap<&'a str, usize>,
}

impl<'a> LayoutPass<'a> {
    fn new(
        engine: &'a LayoutEngine,
        blocks: &'a [FlowBlock],
        measures: &'a [Measure],
        options: &'a LayoutOptions,
        x_rebase: f64,
    ) -> Self {
        let section = SectionState::new(SectionProps::from_options(options));
        Self {
            engine,
            blocks,
            measures,
            options,
            paginator: Paginator::new(options, section),
            floats: FloatManager::new(),
            chains: resolve_keep_next_chains(blocks),
            anchors: plan_anchors(blocks, measures, options, x_rebase),
            lookahead: build_section_lookahead(blocks),
            x_rebase,
            seen_section_break: false,
            section_index: 0,
            block_sections: HashMap::new(),
        }
    }

    fn run(&mut self) -> Result<()> {
        let blocks = self.blocks;
        for (index, block) in blocks.iter().enumerate() {
            if self.anchors.is_owned(index) {
                continue;
            }
            match block {
                FlowBlock::Paragraph(p) => self.layout_paragraph(index, p)?,
                FlowBlock::Table(t) => self.layout_table(index, t)?,
                FlowBlock::Image(_) | FlowBlock::Drawing(_) => self.layout_box(index)?,
                FlowBlock::SectionBreak(b) => self.layout_section_break(index, b)?,
                FlowBlock::PageBreak(_) => {
                    self.expect_unit_measure(index)?;
                    self.paginator.ensure_page();
                    self.paginator.start_new_page();
                }
                FlowBlock::ColumnBreak(_) => {
                    self.expect_unit_measure(index)?;
                    self.paginator.ensure_page();
                    self.paginator.advance_column();
                }
            }
        }
        Ok(())
    }

    /// Trim, then run the post-layout passes.
    fn finish(self, post_process: bool) -> Vec<Page> {
        let final_section = self.section_index;
        let sections = self.block_sections;
        let page_size = self.options.page_size;
        let mut pages = self.paginator.into_pages();

        while pages.last().is_some_and(|p| p.fragments.is_empty()) {
            if let Some(page) = pages.pop() {
                log::debug!("trimmed trailing empty page {}", page.number);
            }
        }

        if !post_process {
            return pages;
        }

        for page in pages.iter_mut() {
            let height = page.size.unwrap_or(page_size).height;
            vertical_align::align_page(page, height);
        }

        if let Some(page) = pages.last_mut() {
            if let Some(region) = page.region.clone() {
                if region.columns.is_multi() {
                    balance::balance_page(page, &region, |id| {
                        sections.get(id) == Some(&final_section)
                    });
                }
            }
        }

        pages
    }

    fn expect_unit_measure(&self, index: usize) -> Result<()> {
        match (&self.blocks[index], &self.measures[index]) {
            (FlowBlock::SectionBreak(_), Measure::SectionBreak)
            | (FlowBlock::PageBreak(_), Measure::PageBreak)
            | (FlowBlock::ColumnBreak(_), Measure::ColumnBreak) => Ok(()),
            _ => Err(kind_mismatch(self.blocks, self.measures, index)),
        }
    }

    fn record_section(&mut self, block_id: &'a str) {
        self.block_sections.insert(block_id, self.section_index);
    }

    // ── Section breaks ──────────────────────────────────────────

    fn layout_section_break(&mut self, index: usize, block: &'a SectionBreakBlock) -> Result<()> {
        self.expect_unit_measure(index)?;

        let effective = effective_section_block(self.blocks, index, block, &self.lookahead);
        let resolved_index = resolved_section_index(&effective, self.paginator.section.upcoming());
        let metadata = self.options.section_metadata(resolved_index);
        let is_first = !self.seen_section_break && !self.paginator.has_pages();
        self.seen_section_break = true;

        let decision =
            schedule_section_break(&effective, &mut self.paginator.section, metadata, is_first);
        self.section_index = self.paginator.section.upcoming().section_index;

        if decision.force_page_break {
            self.break_for_section(decision.required_parity);
        } else if decision.force_mid_page_region && self.paginator.has_pages() {
            self.paginator.begin_column_region();
        }
        Ok(())
    }

    fn break_for_section(&mut self, parity: Option<Parity>) {
        let reuse_blank = self.paginator.current_page_is_blank();
        let next_number = match self.paginator.state() {
            Some(state) if reuse_blank => state.page_number,
            Some(state) => state.page_number + 1,
            None => 1,
        };

        match parity {
            Some(parity) if !parity.matches(next_number) => {
                if !reuse_blank {
                    self.paginator.start_filler_page();
                }
                log::debug!(
                    "page {} left blank so the section starts on an {:?} page",
                    next_number,
                    parity
                );
                self.paginator.start_new_page();
            }
            _ if reuse_blank => {
                self.paginator.reopen_current_page();
            }
            _ => {
                self.paginator.start_new_page();
            }
        }
    }

    // ── Paragraphs ──────────────────────────────────────────────

    fn layout_paragraph(&mut self, index: usize, block: &'a ParagraphBlock) -> Result<()> {
        let measure = paragraph_measure(self.blocks, self.measures, index)?;
        if self.is_marker_artifact(index, block) {
            log::debug!("skipping empty marker paragraph {}", block.id);
            return Ok(());
        }

        self.paginator.ensure_page();
        if block.attrs.page_break_before && !self.paginator.current_page_is_blank() {
            self.paginator.start_new_page();
        }
        self.keep_with_next(index, block)?;
        self.record_section(&block.id);

        let owned = self.anchors.owned_by(index).to_vec();
        let (tables, objects): (Vec<usize>, Vec<usize>) = owned
            .into_iter()
            .partition(|&i| matches!(self.blocks[i], FlowBlock::Table(_)));

        let top = {
            let state = self.paginator.ensure_page();
            (state.cursor_y + leading_gap(state, &block.attrs)).max(state.region_top)
        };
        for i in objects {
            self.place_floating(i, Some(ParagraphSpan { top, bottom: top }))?;
        }

        let span = self.place_paragraph(block, measure);

        for i in tables {
            self.place_floating(i, Some(span))?;
        }
        Ok(())
    }

    /// Empty paragraphs between a page break and a section break only
    /// carry the break in the source format.
    fn is_marker_artifact(&self, index: usize, block: &ParagraphBlock) -> bool {
        block.is_empty()
            && index > 0
            && matches!(self.blocks[index - 1], FlowBlock::PageBreak(_))
            && matches!(self.blocks.get(index + 1), Some(FlowBlock::SectionBreak(_)))
    }

    /// Advance before a keep-with-next group that fits on a blank page but
    /// not in the space left here.
    fn keep_with_next(&mut self, index: usize, block: &ParagraphBlock) -> Result<()> {
        if self.chains.is_mid_chain(index) {
            return Ok(());
        }

        let required = if let Some(chain) = self.chains.starting_at(index) {
            chain_required_height(chain, self.blocks, self.measures)?
        } else if block.attrs.keep_next {
            let pair = KeepNextChain {
                start_index: index,
                end_index: index,
                member_indices: vec![index],
                anchor_index: self
                    .blocks
                    .get(index + 1)
                    .filter(|b| !b.is_break())
                    .map(|_| index + 1),
            };
            chain_required_height(&pair, self.blocks, self.measures)?
        } else {
            return Ok(());
        };

        let state = self.paginator.ensure_page();
        let available = state.remaining() - leading_gap(state, &block.attrs);
        if required <= available + FIT_EPSILON {
            return Ok(());
        }
        if required > state.blank_capacity() + FIT_EPSILON {
            log::warn!(
                "keep-with-next group starting at {} needs {:.1}pt, more than a blank page; laying out in place",
                block.id,
                required
            );
            return Ok(());
        }
        if state.column_has_content {
            log::debug!(
                "keep-with-next group starting at {} ({:.1}pt) moves past page {} column {}",
                block.id,
                required,
                state.page_number,
                state.column_index
            );
            self.paginator.advance_column();
        }
        Ok(())
    }

    /// Move the cursor below exclusion zones that leave no room for a box
    /// of `height` between the given column insets.
    fn clear_floats(&mut self, inset_left: f64, inset_right: f64, height: f64) {
        loop {
            let state = self.paginator.ensure_page();
            let left = state.column_left() + inset_left;
            let width = (state.column_width() - inset_left - inset_right).max(0.0);
            match self
                .floats
                .blocked_until(state.page_number, left, width, state.cursor_y, height)
            {
                None => return,
                Some(resume) if resume + height <= state.content_bottom + FIT_EPSILON => {
                    state.move_to(resume);
                }
                Some(_) => {
                    self.paginator.advance_column();
                }
            }
        }
    }

    fn remeasure_for_floats<'m>(
        &self,
        block: &ParagraphBlock,
        measure: &'m ParagraphMeasure,
        state: &PageState,
    ) -> Cow<'m, ParagraphMeasure> {
        let Some(remeasurer) = self.engine.remeasurer.as_deref() else {
            return Cow::Borrowed(measure);
        };
        if self.floats.is_empty() {
            return Cow::Borrowed(measure);
        }

        let attrs = &block.attrs;
        let left = state.column_left() + attrs.indent.left;
        let width = (state.column_width() - attrs.indent.left - attrs.indent.right).max(0.0);
        let band = self.floats.narrowest_band(
            state.page_number,
            left,
            width,
            state.cursor_y,
            measure.content_height(),
        );
        if band.width + FIT_EPSILON >= width || measure.max_line_width() <= band.width + FIT_EPSILON {
            return Cow::Borrowed(measure);
        }

        match remeasurer.remeasure(block, band.width) {
            Some(narrow) => {
                log::debug!(
                    "remeasured {} at {:.1}pt beside floating objects",
                    block.id,
                    band.width
                );
                Cow::Owned(narrow)
            }
            None => Cow::Borrowed(measure),
        }
    }

    fn place_paragraph(&mut self, block: &ParagraphBlock, measure: &ParagraphMeasure) -> ParagraphSpan {
        let attrs = &block.attrs;
        let top = {
            let state = self.paginator.ensure_page();
            let top = (state.cursor_y + leading_gap(state, attrs)).max(state.region_top);
            state.move_to(top);
            top
        };

        let measure = match self.paginator.state() {
            Some(state) => self.remeasure_for_floats(block, measure, state),
            None => Cow::Borrowed(measure),
        };
        let heights: Vec<f64> = if measure.lines.is_empty() {
            vec![measure.total_height]
        } else {
            measure.lines.iter().map(|l| l.height).collect()
        };
        let rule = SplitRule::for_paragraph(attrs);
        let n = heights.len();
        let mut span = ParagraphSpan { top, bottom: top };
        let mut line = 0;

        while line < n {
            self.clear_floats(attrs.indent.left, attrs.indent.right, heights[line]);

            let state = self.paginator.ensure_page();
            let decision = decide_split(state.remaining(), &heights[line..], rule, state.at_column_top());
            let count = match decision {
                SplitDecision::MoveToNextColumn => {
                    self.paginator.advance_column();
                    continue;
                }
                SplitDecision::PlaceAll => n - line,
                SplitDecision::Split { items_here } => items_here,
            };

            let to_line = line + count;
            let height: f64 = heights[line..to_line].iter().sum();
            let y = state.cursor_y;
            let left = state.column_left() + attrs.indent.left;
            let width = (state.column_width() - attrs.indent.left - attrs.indent.right).max(0.0);
            let band = self
                .floats
                .narrowest_band(state.page_number, left, width, y, height);

            let para = ParaFragment {
                block_id: block.id.clone(),
                x: band.x,
                y,
                width: band.width,
                height,
                from_line: line.min(measure.lines.len()),
                to_line: to_line.min(measure.lines.len()),
                continues_from_prev: line > 0,
                continues_on_next: to_line < n,
            };
            let fragment = match &attrs.marker {
                Some(marker) => Fragment::ListItem(ListItemFragment {
                    para,
                    marker_width: measure.marker_width.unwrap_or(0.0),
                    marker_text: (line == 0).then(|| marker.text.clone()),
                }),
                None => Fragment::Para(para),
            };
            self.paginator.push_flow(fragment);
            self.paginator.ensure_page().advance(height);

            if line == 0 {
                span.top = y;
            }
            span.bottom = y + height;
            line = to_line;
            if line < n {
                self.paginator.advance_column();
            }
        }

        let state = self.paginator.ensure_page();
        state.advance(attrs.spacing.after);
        state.trailing_spacing = attrs.spacing.after;
        state.last_paragraph = Some(attrs.clone());
        span
    }

    // ── Tables ──────────────────────────────────────────────────

    fn layout_table(&mut self, index: usize, block: &'a TableBlock) -> Result<()> {
        let measure = table_measure(self.blocks, self.measures, index)?;
        if block.anchor.is_some() {
            return self.place_floating(index, None);
        }
        self.record_section(&block.id);

        let rows: Vec<f64> = if measure.rows.is_empty() {
            vec![measure.height]
        } else {
            measure.rows.iter().map(|r| r.height).collect()
        };
        let n = rows.len();
        let header = block.attrs.repeat_header_rows.min(n);
        let mut row = 0;

        while row < n {
            self.clear_floats(0.0, 0.0, rows[row]);

            let state = self.paginator.ensure_page();
            let repeat = if row > 0 && row >= header { header } else { 0 };
            let header_height: f64 = rows[..repeat].iter().sum();
            let decision = decide_split(
                state.remaining() - header_height,
                &rows[row..],
                SplitRule::for_table_rows(),
                state.at_column_top(),
            );
            let count = match decision {
                SplitDecision::MoveToNextColumn => {
                    self.paginator.advance_column();
                    continue;
                }
                SplitDecision::PlaceAll => n - row,
                SplitDecision::Split { items_here } => items_here,
            };

            let to_row = row + count;
            let height = header_height + rows[row..to_row].iter().sum::<f64>();
            let column_width = state.column_width();
            let offset = match block.attrs.justification {
                TableJustification::Left => block.attrs.indent,
                TableJustification::Center => ((column_width - measure.width) / 2.0).max(0.0),
                TableJustification::Right => (column_width - measure.width).max(0.0),
            };
            let fragment = Fragment::Table(TableFragment {
                block_id: block.id.clone(),
                x: state.column_left() + offset,
                y: state.cursor_y,
                width: measure.width,
                height,
                from_row: row,
                to_row,
                repeat_header_rows: repeat,
                continues_from_prev: row > 0,
                continues_on_next: to_row < n,
                is_anchored: false,
            });
            self.paginator.push_flow(fragment);
            self.paginator.ensure_page().advance(height);

            row = to_row;
            if row < n {
                log::debug!("table {} continues at row {}", block.id, row);
                self.paginator.advance_column();
            }
        }

        self.paginator.ensure_page().reset_flow();
        Ok(())
    }

    // ── Images and drawings ─────────────────────────────────────

    fn layout_box(&mut self, index: usize) -> Result<()> {
        let blocks = self.blocks;
        let block = &blocks[index];
        if block.anchor().is_some() {
            return self.place_floating(index, None);
        }
        let (width, height) = floating_size(block, &self.measures[index])
            .ok_or_else(|| kind_mismatch(self.blocks, self.measures, index))?;
        self.record_section(block.id());

        loop {
            self.clear_floats(0.0, 0.0, height);
            let state = self.paginator.ensure_page();
            if height > state.remaining() + FIT_EPSILON && !state.at_column_top() {
                self.paginator.advance_column();
                continue;
            }
            break;
        }

        let state = self.paginator.ensure_page();
        let (x, y) = (state.column_left(), state.cursor_y);
        let fragment = match block {
            FlowBlock::Drawing(d) => Fragment::Drawing(DrawingFragment {
                block_id: d.id.clone(),
                drawing_kind: d.drawing_kind,
                x,
                y,
                width,
                height,
                ..Default::default()
            }),
            _ => Fragment::Image(ImageFragment {
                block_id: block.id().to_string(),
                x,
                y,
                width,
                height,
                ..Default::default()
            }),
        };
        self.paginator.push_flow(fragment);
        let state = self.paginator.ensure_page();
        state.advance(height);
        state.reset_flow();
        Ok(())
    }

    /// Place an anchored image, drawing or table and register its
    /// exclusion zone. `paragraph` is the owning paragraph, if any.
    fn place_floating(&mut self, index: usize, paragraph: Option<ParagraphSpan>) -> Result<()> {
        let blocks = self.blocks;
        let block = &blocks[index];
        let Some(anchor) = block.anchor().copied() else {
            return Ok(());
        };
        let (width, height) = floating_size(block, &self.measures[index])
            .ok_or_else(|| kind_mismatch(self.blocks, self.measures, index))?;
        self.record_section(block.id());

        let x_rebase = self.x_rebase;
        let page_relative = self.anchors.page_relative(index);
        let state = self.paginator.ensure_page();
        let (x, y) = match page_relative {
            Some(position) => (position.x, position.y),
            None => {
                let h_frame = match anchor.h_relative_from {
                    HRelativeFrom::Column => AxisBox {
                        start: state.column_left(),
                        extent: state.column_width(),
                    },
                    HRelativeFrom::Margin => AxisBox {
                        start: state.content_left,
                        extent: state.content_width,
                    },
                    HRelativeFrom::Page => AxisBox {
                        start: -x_rebase,
                        extent: state.page_width,
                    },
                };
                let y = match anchor.v_relative_from {
                    VRelativeFrom::Paragraph => {
                        paragraph.map_or(state.cursor_y, |p| p.top) + anchor.offset_v
                    }
                    VRelativeFrom::Margin => resolve_y(
                        &anchor,
                        AxisBox {
                            start: state.content_top,
                            extent: state.content_bottom - state.content_top,
                        },
                        height,
                    ),
                    VRelativeFrom::Page => resolve_y(
                        &anchor,
                        AxisBox {
                            start: 0.0,
                            extent: state.page_height,
                        },
                        height,
                    ),
                };
                (resolve_x(&anchor, h_frame, width), y)
            }
        };

        let (page_number, column) = (state.page_number, state.column_index);
        let fragment = match block {
            FlowBlock::Table(t) => {
                let rows = table_measure(self.blocks, self.measures, index)?.rows.len();
                // Never above the bottom of the paragraph it belongs to.
                let y = paragraph.map_or(y, |p| y.max(p.bottom));
                Fragment::Table(TableFragment {
                    block_id: t.id.clone(),
                    x,
                    y,
                    width,
                    height,
                    from_row: 0,
                    to_row: rows,
                    is_anchored: true,
                    ..Default::default()
                })
            }
            FlowBlock::Drawing(d) => Fragment::Drawing(DrawingFragment {
                block_id: d.id.clone(),
                drawing_kind: d.drawing_kind,
                x,
                y,
                width,
                height,
                is_anchored: true,
                behind_doc: anchor.behind_doc,
                z_index: anchor.z_index,
            }),
            _ => Fragment::Image(ImageFragment {
                block_id: block.id().to_string(),
                x,
                y,
                width,
                height,
                is_anchored: true,
                behind_doc: anchor.behind_doc,
                z_index: anchor.z_index,
            }),
        };

        self.floats
            .register(page_number, column, block.id(), fragment.rect(), anchor.wrap);
        self.paginator.push_floating(fragment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn para(id: &str) -> FlowBlock {
        FlowBlock::Paragraph(ParagraphBlock {
            id: id.into(),
            runs: vec![TextRun { text: "text".into() }],
            attrs: ParagraphAttrs::default(),
        })
    }

    fn lines(n: usize, height: f64) -> Measure {
        Measure::Paragraph(ParagraphMeasure {
            lines: (0..n).map(|_| LineMeasure { height, width: 400.0 }).collect(),
            total_height: n as f64 * height,
            marker_width: None,
        })
    }

    #[test]
    fn measurement_box_of_a_letter_page() {
        let c = resolve_measurement_constraints(&LayoutOptions::default(), &[]);
        assert_eq!(c.measurement_width, 468.0);
        assert_eq!(c.measurement_height, 648.0);
    }

    #[test]
    fn measurement_box_takes_widest_section() {
        let blocks = vec![
            FlowBlock::SectionBreak(SectionBreakBlock {
                id: "s1".into(),
                columns: Some(ColumnLayout::new(2, 48.0)),
                ..Default::default()
            }),
            para("a"),
            FlowBlock::SectionBreak(SectionBreakBlock {
                id: "s2".into(),
                orientation: Some(Orientation::Landscape),
                columns: Some(ColumnLayout::single()),
                ..Default::default()
            }),
        ];
        let c = resolve_measurement_constraints(&LayoutOptions::default(), &blocks);
        // Landscape: 792 - 144 wide, portrait: 792 - 144 tall.
        assert_eq!(c.measurement_width, 648.0);
        assert_eq!(c.measurement_height, 648.0);
    }

    #[test]
    fn fragment_accessors_cover_list_items() {
        let mut f = Fragment::ListItem(ListItemFragment {
            para: ParaFragment {
                block_id: "li".into(),
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 40.0,
                ..Default::default()
            },
            marker_width: 12.0,
            marker_text: Some("1.".into()),
        });
        assert_eq!(f.block_id(), "li");
        assert_eq!(f.bottom(), 60.0);
        f.translate(5.0, 5.0);
        assert_eq!((f.x(), f.y()), (15.0, 25.0));
        assert!(!f.is_anchored());
    }

    #[test]
    fn leading_gap_reclaims_trailing_space_for_contextual_spacing() {
        let options = LayoutOptions::default();
        let mut paginator = Paginator::new(
            &options,
            SectionState::new(SectionProps::from_options(&options)),
        );
        let state = paginator.ensure_page();
        let mut prev = ParagraphAttrs::default();
        prev.spacing.after = 12.0;
        prev.contextual_spacing = true;
        state.last_paragraph = Some(prev.clone());
        state.trailing_spacing = 12.0;

        let mut next = prev.clone();
        next.spacing.before = 4.0;
        assert_eq!(leading_gap(state, &next), -12.0);

        next.style_id = Some("Heading1".into());
        assert_eq!(leading_gap(state, &next), 0.0);
    }

    #[test]
    fn kind_mismatch_is_reported_when_the_block_is_reached() {
        let engine = LayoutEngine::new();
        let blocks = vec![para("a"), para("b")];
        let measures = vec![lines(1, 20.0), Measure::PageBreak];
        let err = engine
            .layout_document(&blocks, &measures, &LayoutOptions::default())
            .unwrap_err();
        match err {
            FolioError::MeasureKindMismatch {
                index, expected, found, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(expected, "paragraph");
                assert_eq!(found, "pageBreak");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn marker_paragraph_between_breaks_is_skipped() {
        let engine = LayoutEngine::new();
        let blocks = vec![
            para("a"),
            FlowBlock::PageBreak(BreakBlock { id: "pb".into() }),
            FlowBlock::Paragraph(ParagraphBlock {
                id: "marker".into(),
                ..Default::default()
            }),
            FlowBlock::SectionBreak(SectionBreakBlock {
                id: "s1".into(),
                break_type: Some(SectionBreakType::Continuous),
                ..Default::default()
            }),
            para("b"),
        ];
        let measures = vec![
            lines(1, 20.0),
            Measure::PageBreak,
            lines(1, 20.0),
            Measure::SectionBreak,
            lines(1, 20.0),
        ];
        let layout = engine
            .layout_document(&blocks, &measures, &LayoutOptions::default())
            .unwrap();
        assert_eq!(layout.pages.len(), 2);
        let ids: Vec<&str> = layout.pages[1]
            .fragments
            .iter()
            .map(|f| f.block_id())
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn spacing_collapses_to_the_larger_value() {
        let engine = LayoutEngine::new();
        let mut a = ParagraphAttrs::default();
        a.spacing.after = 10.0;
        let mut b = ParagraphAttrs::default();
        b.spacing.before = 16.0;
        let blocks = vec![
            FlowBlock::Paragraph(ParagraphBlock {
                id: "a".into(),
                attrs: a,
                ..Default::default()
            }),
            FlowBlock::Paragraph(ParagraphBlock {
                id: "b".into(),
                attrs: b,
                ..Default::default()
            }),
        ];
        let measures = vec![lines(1, 20.0), lines(1, 20.0)];
        let layout = engine
            .layout_document(&blocks, &measures, &LayoutOptions::default())
            .unwrap();
        let f = &layout.pages[0].fragments;
        assert_eq!(f[0].y(), 72.0);
        assert_eq!(f[1].y(), 72.0 + 20.0 + 16.0);
    }

    #[test]
    fn remeasurer_sees_narrowed_width() {
        use std::cell::Cell;
        use std::rc::Rc;

        let seen = Rc::new(Cell::new(0.0));
        let seen_in = Rc::clone(&seen);
        let engine = LayoutEngine::new().with_remeasurer(Box::new(
            move |_: &ParagraphBlock, width: f64| -> Option<ParagraphMeasure> {
                seen_in.set(width);
                None
            },
        ));

        let anchor = Anchor {
            h_relative_from: HRelativeFrom::Margin,
            v_relative_from: VRelativeFrom::Paragraph,
            wrap: Wrap {
                kind: WrapKind::Square,
                side: WrapSide::Right,
                ..Default::default()
            },
            ..Default::default()
        };
        let blocks = vec![
            para("p1"),
            FlowBlock::Image(ImageBlock {
                id: "img".into(),
                src: Some("a.png".into()),
                anchor: Some(anchor),
            }),
            para("p2"),
        ];
        let measures = vec![
            lines(3, 20.0),
            Measure::Image(BoxMeasure {
                width: 100.0,
                height: 50.0,
            }),
            lines(3, 20.0),
        ];
        engine
            .layout_document(&blocks, &measures, &LayoutOptions::default())
            .unwrap();
        // The image sits at p1's top; p1 is remeasured beside it.
        assert_eq!(seen.get(), 368.0);
    }
}

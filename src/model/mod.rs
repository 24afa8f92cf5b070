//! # Block Model
//!
//! The input representation for the pagination engine. A document arrives as
//! a flat list of [`FlowBlock`]s with a parallel list of [`Measure`]s: the
//! measurement collaborator has already broken paragraphs into lines and
//! sized tables, images and drawings. Layout never looks inside a run; it
//! only needs heights, widths and the handful of paragraph attributes that
//! drive page breaking.
//!
//! Everything here is plain data with serde derives so the whole input can
//! be produced as JSON by an importer and fed straight to the engine.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Page geometry ───────────────────────────────────────────────

/// Physical page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl Default for PageSize {
    fn default() -> Self {
        Self::LETTER
    }
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Swap the dimensions if they disagree with the requested orientation.
    pub fn oriented(self, orientation: Orientation) -> Self {
        let landscape = self.width > self.height;
        match orientation {
            Orientation::Landscape if !landscape => Self::new(self.height, self.width),
            Orientation::Portrait if landscape => Self::new(self.height, self.width),
            _ => self,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page margins plus the header/footer distances from the page edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageMargins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
    pub header: f64,
    pub footer: f64,
}

impl Default for PageMargins {
    fn default() -> Self {
        Self {
            top: 72.0,
            right: 72.0,
            bottom: 72.0,
            left: 72.0,
            header: 36.0,
            footer: 36.0,
        }
    }
}

impl PageMargins {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
            header: 0.0,
            footer: 0.0,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Partial margins as carried by a section break. Missing sides inherit from
/// the section in effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMargins {
    pub top: Option<f64>,
    pub right: Option<f64>,
    pub bottom: Option<f64>,
    pub left: Option<f64>,
    pub header: Option<f64>,
    pub footer: Option<f64>,
}

impl SectionMargins {
    pub fn apply_to(&self, base: PageMargins) -> PageMargins {
        PageMargins {
            top: self.top.unwrap_or(base.top),
            right: self.right.unwrap_or(base.right),
            bottom: self.bottom.unwrap_or(base.bottom),
            left: self.left.unwrap_or(base.left),
            header: self.header.unwrap_or(base.header),
            footer: self.footer.unwrap_or(base.footer),
        }
    }
}

/// Column configuration of a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLayout {
    #[serde(default = "default_column_count")]
    pub count: u32,
    #[serde(default)]
    pub gap: f64,
    /// Explicit per-column widths (unequal columns). Ignored unless there is
    /// exactly one positive width per column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub widths: Vec<f64>,
    /// Draw a separator line between columns (carried through for painting).
    #[serde(default)]
    pub separator: bool,
}

fn default_column_count() -> u32 {
    1
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::single()
    }
}

impl ColumnLayout {
    pub fn single() -> Self {
        Self::new(1, 0.0)
    }

    pub fn new(count: u32, gap: f64) -> Self {
        Self {
            count,
            gap,
            widths: Vec::new(),
            separator: false,
        }
    }

    /// True when the two configurations would place content differently.
    pub fn same_shape(&self, other: &ColumnLayout) -> bool {
        self.count.max(1) == other.count.max(1)
            && (self.gap - other.gap).abs() < 1e-6
            && self.widths == other.widths
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
    /// Vertical justification. Laid out as `Center`.
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionBreakType {
    Continuous,
    NextPage,
    EvenPage,
    OddPage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberFormat {
    #[default]
    Decimal,
    LowerRoman,
    UpperRoman,
    LowerLetter,
    UpperLetter,
    NumberInDash,
}

/// Page numbering of a section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNumbering {
    #[serde(default)]
    pub format: NumberFormat,
    /// Restart value for the first page of the section.
    #[serde(default)]
    pub start: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeaderFooterVariant {
    #[default]
    Default,
    First,
    Even,
    Odd,
}

/// Header or footer relationship ids per variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFooterRefs {
    pub default: Option<String>,
    pub first: Option<String>,
    pub even: Option<String>,
    pub odd: Option<String>,
}

impl HeaderFooterRefs {
    pub fn get(&self, variant: HeaderFooterVariant) -> Option<&str> {
        match variant {
            HeaderFooterVariant::Default => self.default.as_deref(),
            HeaderFooterVariant::First => self.first.as_deref(),
            HeaderFooterVariant::Even => self.even.as_deref(),
            HeaderFooterVariant::Odd => self.odd.as_deref(),
        }
    }

    /// Fill every variant this section leaves unset with the same variant
    /// of the previous section.
    pub fn inherit_from(&self, previous: &HeaderFooterRefs) -> HeaderFooterRefs {
        HeaderFooterRefs {
            default: self.default.clone().or_else(|| previous.default.clone()),
            first: self.first.clone().or_else(|| previous.first.clone()),
            even: self.even.clone().or_else(|| previous.even.clone()),
            odd: self.odd.clone().or_else(|| previous.odd.clone()),
        }
    }

    /// Resolve a variant, falling back to this section's default ref.
    pub fn resolve(&self, variant: HeaderFooterVariant) -> Option<&str> {
        self.get(variant).or(self.default.as_deref())
    }
}

// ── Anchors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HRelativeFrom {
    #[default]
    Column,
    Margin,
    Page,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VRelativeFrom {
    #[default]
    Paragraph,
    Margin,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VAlign {
    Top,
    Center,
    Bottom,
}

/// How text flows around a floating object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WrapKind {
    /// No exclusion: the object floats in front of or behind the text.
    #[default]
    None,
    Square,
    Tight,
    Through,
    /// Text stops above the object and resumes below it.
    TopAndBottom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WrapSide {
    #[default]
    BothSides,
    Left,
    Right,
    Largest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wrap {
    #[serde(default)]
    pub kind: WrapKind,
    #[serde(default)]
    pub side: WrapSide,
    #[serde(default)]
    pub dist_top: f64,
    #[serde(default)]
    pub dist_bottom: f64,
    #[serde(default)]
    pub dist_left: f64,
    #[serde(default)]
    pub dist_right: f64,
}

/// Positioning of an object outside the normal text flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    #[serde(default)]
    pub h_relative_from: HRelativeFrom,
    #[serde(default)]
    pub v_relative_from: VRelativeFrom,
    #[serde(default)]
    pub align_h: Option<HAlign>,
    #[serde(default)]
    pub align_v: Option<VAlign>,
    #[serde(default)]
    pub offset_h: f64,
    #[serde(default)]
    pub offset_v: f64,
    /// Painted behind body text. Never counted in header/footer height.
    #[serde(default)]
    pub behind_doc: bool,
    #[serde(default)]
    pub wrap: Wrap,
    #[serde(default)]
    pub z_index: Option<i32>,
}

impl Anchor {
    /// Page-relative anchors are positioned once, before the main pass.
    pub fn is_page_relative(&self) -> bool {
        self.v_relative_from == VRelativeFrom::Page
    }
}

// ── Blocks ──────────────────────────────────────────────────────

/// One unit of document content in reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FlowBlock {
    Paragraph(ParagraphBlock),
    Table(TableBlock),
    Image(ImageBlock),
    Drawing(DrawingBlock),
    SectionBreak(SectionBreakBlock),
    PageBreak(BreakBlock),
    ColumnBreak(BreakBlock),
}

impl FlowBlock {
    pub fn id(&self) -> &str {
        match self {
            FlowBlock::Paragraph(b) => &b.id,
            FlowBlock::Table(b) => &b.id,
            FlowBlock::Image(b) => &b.id,
            FlowBlock::Drawing(b) => &b.id,
            FlowBlock::SectionBreak(b) => &b.id,
            FlowBlock::PageBreak(b) | FlowBlock::ColumnBreak(b) => &b.id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FlowBlock::Paragraph(_) => "paragraph",
            FlowBlock::Table(_) => "table",
            FlowBlock::Image(_) => "image",
            FlowBlock::Drawing(_) => "drawing",
            FlowBlock::SectionBreak(_) => "sectionBreak",
            FlowBlock::PageBreak(_) => "pageBreak",
            FlowBlock::ColumnBreak(_) => "columnBreak",
        }
    }

    /// Section, page and column breaks.
    pub fn is_break(&self) -> bool {
        matches!(
            self,
            FlowBlock::SectionBreak(_) | FlowBlock::PageBreak(_) | FlowBlock::ColumnBreak(_)
        )
    }

    /// The anchor of a floating image, drawing or table.
    pub fn anchor(&self) -> Option<&Anchor> {
        match self {
            FlowBlock::Table(b) => b.anchor.as_ref(),
            FlowBlock::Image(b) => b.anchor.as_ref(),
            FlowBlock::Drawing(b) => b.anchor.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphBlock {
    pub id: String,
    #[serde(default)]
    pub runs: Vec<TextRun>,
    #[serde(default)]
    pub attrs: ParagraphAttrs,
}

impl ParagraphBlock {
    /// No runs, or only runs without text.
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.text.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextRun {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphAttrs {
    #[serde(default)]
    pub spacing: Spacing,
    #[serde(default)]
    pub indent: Indent,
    #[serde(default)]
    pub keep_next: bool,
    #[serde(default)]
    pub keep_lines: bool,
    #[serde(default = "default_true")]
    pub widow_control: bool,
    #[serde(default)]
    pub contextual_spacing: bool,
    #[serde(default)]
    pub style_id: Option<String>,
    #[serde(default)]
    pub page_break_before: bool,
    #[serde(default)]
    pub marker: Option<ListMarker>,
}

fn default_true() -> bool {
    true
}

impl Default for ParagraphAttrs {
    fn default() -> Self {
        Self {
            spacing: Spacing::default(),
            indent: Indent::default(),
            keep_next: false,
            keep_lines: false,
            widow_control: true,
            contextual_spacing: false,
            style_id: None,
            page_break_before: false,
            marker: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Spacing {
    #[serde(default)]
    pub before: f64,
    #[serde(default)]
    pub after: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indent {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub first_line: f64,
    #[serde(default)]
    pub hanging: f64,
}

/// List numbering marker rendered in front of the first line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMarker {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub gutter: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBlock {
    pub id: String,
    #[serde(default)]
    pub attrs: TableAttrs,
    #[serde(default)]
    pub anchor: Option<Anchor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableJustification {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAttrs {
    #[serde(default)]
    pub justification: TableJustification,
    #[serde(default)]
    pub indent: f64,
    /// Leading rows repeated at the top of every continuation fragment.
    #[serde(default)]
    pub repeat_header_rows: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageBlock {
    pub id: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub anchor: Option<Anchor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawingKind {
    #[default]
    Shape,
    Group,
    Vector,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingBlock {
    pub id: String,
    #[serde(default)]
    pub drawing_kind: DrawingKind,
    #[serde(default)]
    pub anchor: Option<Anchor>,
}

/// Section properties carried by a section break. Every field is optional;
/// the section state machine decides what missing values inherit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionBreakBlock {
    pub id: String,
    #[serde(default)]
    pub break_type: Option<SectionBreakType>,
    #[serde(default)]
    pub page_size: Option<PageSize>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub margins: Option<SectionMargins>,
    #[serde(default)]
    pub columns: Option<ColumnLayout>,
    #[serde(default)]
    pub vertical_align: Option<VerticalAlign>,
    #[serde(default)]
    pub numbering: Option<PageNumbering>,
    #[serde(default)]
    pub header_refs: Option<HeaderFooterRefs>,
    #[serde(default)]
    pub footer_refs: Option<HeaderFooterRefs>,
    #[serde(default)]
    pub title_page: Option<bool>,
    #[serde(default)]
    pub section_index: Option<usize>,
    #[serde(default)]
    pub require_page_boundary: bool,
    /// The importer stored this section's properties on the following
    /// section break rather than on this one.
    #[serde(default)]
    pub properties_from_next_section: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakBlock {
    pub id: String,
}

// ── Measures ────────────────────────────────────────────────────

/// Geometry for one block, produced by the measurement collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Measure {
    Paragraph(ParagraphMeasure),
    Table(TableMeasure),
    Image(BoxMeasure),
    Drawing(BoxMeasure),
    SectionBreak,
    PageBreak,
    ColumnBreak,
}

impl Measure {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Measure::Paragraph(_) => "paragraph",
            Measure::Table(_) => "table",
            Measure::Image(_) => "image",
            Measure::Drawing(_) => "drawing",
            Measure::SectionBreak => "sectionBreak",
            Measure::PageBreak => "pageBreak",
            Measure::ColumnBreak => "columnBreak",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphMeasure {
    #[serde(default)]
    pub lines: Vec<LineMeasure>,
    #[serde(default)]
    pub total_height: f64,
    #[serde(default)]
    pub marker_width: Option<f64>,
}

impl ParagraphMeasure {
    /// Height of the line boxes, excluding paragraph spacing.
    pub fn content_height(&self) -> f64 {
        if self.lines.is_empty() {
            self.total_height
        } else {
            self.lines.iter().map(|l| l.height).sum()
        }
    }

    pub fn first_line_height(&self) -> f64 {
        self.lines
            .first()
            .map(|l| l.height)
            .unwrap_or(self.total_height)
    }

    pub fn max_line_width(&self) -> f64 {
        self.lines.iter().map(|l| l.width).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LineMeasure {
    pub height: f64,
    #[serde(default)]
    pub width: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeasure {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rows: Vec<RowMeasure>,
}

impl TableMeasure {
    pub fn first_row_height(&self) -> f64 {
        self.rows.first().map(|r| r.height).unwrap_or(self.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RowMeasure {
    pub height: f64,
}

/// Width and height of an image or drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxMeasure {
    pub width: f64,
    pub height: f64,
}

// ── Options ─────────────────────────────────────────────────────

/// Authoritative per-section metadata from the importer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMetadata {
    pub index: usize,
    #[serde(default)]
    pub numbering: Option<PageNumbering>,
    #[serde(default)]
    pub header_refs: Option<HeaderFooterRefs>,
    #[serde(default)]
    pub footer_refs: Option<HeaderFooterRefs>,
    #[serde(default)]
    pub title_page: Option<bool>,
}

/// Measured header or footer content heights, one per variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantHeights {
    pub default: Option<f64>,
    pub first: Option<f64>,
    pub even: Option<f64>,
    pub odd: Option<f64>,
}

impl VariantHeights {
    pub fn get(&self, variant: HeaderFooterVariant) -> Option<f64> {
        match variant {
            HeaderFooterVariant::Default => self.default,
            HeaderFooterVariant::First => self.first,
            HeaderFooterVariant::Even => self.even,
            HeaderFooterVariant::Odd => self.odd,
        }
    }
}

/// Document-level layout configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    #[serde(default)]
    pub page_size: PageSize,
    #[serde(default)]
    pub margins: PageMargins,
    #[serde(default)]
    pub columns: ColumnLayout,
    #[serde(default)]
    pub sections: Vec<SectionMetadata>,
    /// Document-wide even/odd header setting.
    #[serde(default)]
    pub alternate_headers: bool,
    /// Height reserved for footnotes at the bottom of a page, by page number.
    #[serde(default)]
    pub footnote_reserved: HashMap<u32, f64>,
    #[serde(default)]
    pub header_content_heights: VariantHeights,
    #[serde(default)]
    pub footer_content_heights: VariantHeights,
    #[serde(default)]
    pub header_heights_by_ref: HashMap<String, f64>,
    #[serde(default)]
    pub footer_heights_by_ref: HashMap<String, f64>,
}

impl LayoutOptions {
    pub fn section_metadata(&self, index: usize) -> Option<&SectionMetadata> {
        self.sections.iter().find(|s| s.index == index)
    }
}

/// A complete layout request: blocks, their measures and options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInput {
    pub blocks: Vec<FlowBlock>,
    pub measures: Vec<Measure>,
    #[serde(default)]
    pub options: LayoutOptions,
}

/// Content box for a header/footer layout pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderFooterConstraints {
    pub width: f64,
    pub height: f64,
    /// Left page margin of the body the header/footer belongs to. Page
    /// relative horizontal anchor offsets are rebased by it.
    #[serde(default)]
    pub margin_left: f64,
}

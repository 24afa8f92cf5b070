//! # Section Breaks
//!
//! A section break changes page geometry, columns, numbering and header/footer
//! configuration, but a mid-document break must not touch the page that is
//! already being filled. Every section property therefore lives in a
//! two-slot record: `active` (in effect now) and `pending` (takes effect at
//! the next page boundary). The paginator calls [`SectionState::commit`]
//! exactly once per page it opens; nothing else promotes pending values.
//!
//! The one exception is a continuous break that changes the column count:
//! columns switch at the current cursor position (a new constraint region)
//! while everything else still waits for the next page.

use std::borrow::Cow;
use std::collections::HashMap;

use serde::Serialize;

use crate::model::*;

/// Every property a section decides for the pages it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionProps {
    /// Oriented page size.
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub margins: PageMargins,
    pub columns: ColumnLayout,
    /// `None` means top alignment.
    pub vertical_align: Option<VerticalAlign>,
    pub numbering: PageNumbering,
    pub header_refs: HeaderFooterRefs,
    pub footer_refs: HeaderFooterRefs,
    pub title_page: bool,
    pub section_index: usize,
}

impl SectionProps {
    /// The implicit section in effect before any section break is seen.
    pub fn from_options(options: &LayoutOptions) -> Self {
        let meta = options.section_metadata(0);
        Self {
            page_size: options.page_size,
            orientation: if options.page_size.width > options.page_size.height {
                Orientation::Landscape
            } else {
                Orientation::Portrait
            },
            margins: options.margins,
            columns: options.columns.clone(),
            vertical_align: None,
            numbering: meta.and_then(|m| m.numbering).unwrap_or_default(),
            header_refs: meta.and_then(|m| m.header_refs.clone()).unwrap_or_default(),
            footer_refs: meta.and_then(|m| m.footer_refs.clone()).unwrap_or_default(),
            title_page: meta.and_then(|m| m.title_page).unwrap_or(false),
            section_index: 0,
        }
    }
}

/// Active and pending section properties.
#[derive(Debug, Clone)]
pub struct SectionState {
    active: SectionProps,
    pending: Option<SectionProps>,
}

impl SectionState {
    pub fn new(initial: SectionProps) -> Self {
        Self {
            active: initial,
            pending: None,
        }
    }

    pub fn active(&self) -> &SectionProps {
        &self.active
    }

    pub fn pending(&self) -> Option<&SectionProps> {
        self.pending.as_ref()
    }

    /// The properties the next page will get: pending if scheduled, else
    /// active. New sections inherit from these.
    pub fn upcoming(&self) -> &SectionProps {
        self.pending.as_ref().unwrap_or(&self.active)
    }

    /// Apply immediately (first section of a document, before any page).
    pub fn apply_now(&mut self, props: SectionProps) {
        self.active = props;
        self.pending = None;
    }

    /// Apply at the next page boundary.
    pub fn schedule(&mut self, props: SectionProps) {
        self.pending = Some(props);
    }

    /// Switch columns mid-page. A scheduled section keeps the new columns too.
    pub fn switch_columns(&mut self, columns: ColumnLayout) {
        if let Some(pending) = self.pending.as_mut() {
            pending.columns = columns.clone();
        }
        self.active.columns = columns;
    }

    /// Promote pending properties. Returns true if anything was pending.
    pub fn commit(&mut self) -> bool {
        match self.pending.take() {
            Some(next) => {
                self.active = next;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn matches(self, page_number: u32) -> bool {
        match self {
            Parity::Even => page_number % 2 == 0,
            Parity::Odd => page_number % 2 == 1,
        }
    }
}

/// What the driver must do for a section break.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionBreakDecision {
    pub force_page_break: bool,
    pub force_mid_page_region: bool,
    pub required_parity: Option<Parity>,
}

/// Resolve the full property set of the section a break starts.
///
/// Omitted properties inherit from `inherit` (the section the next page
/// would otherwise get), except vertical alignment which never inherits.
/// Section metadata wins over the block for numbering, refs and title page.
pub fn resolve_section_props(
    block: &SectionBreakBlock,
    metadata: Option<&SectionMetadata>,
    inherit: &SectionProps,
) -> SectionProps {
    let orientation = block.orientation.unwrap_or(inherit.orientation);
    let page_size = block
        .page_size
        .unwrap_or(inherit.page_size)
        .oriented(orientation);
    let margins = block
        .margins
        .map(|m| m.apply_to(inherit.margins))
        .unwrap_or(inherit.margins);

    let numbering = metadata
        .and_then(|m| m.numbering)
        .or(block.numbering)
        .unwrap_or_default();

    let header_refs = metadata
        .and_then(|m| m.header_refs.clone())
        .or_else(|| block.header_refs.clone())
        .unwrap_or_default()
        .inherit_from(&inherit.header_refs);
    let footer_refs = metadata
        .and_then(|m| m.footer_refs.clone())
        .or_else(|| block.footer_refs.clone())
        .unwrap_or_default()
        .inherit_from(&inherit.footer_refs);

    SectionProps {
        page_size,
        orientation,
        margins,
        columns: block
            .columns
            .clone()
            .unwrap_or_else(|| inherit.columns.clone()),
        vertical_align: block
            .vertical_align
            .filter(|v| *v != VerticalAlign::Top),
        numbering,
        header_refs,
        footer_refs,
        title_page: metadata
            .and_then(|m| m.title_page)
            .or(block.title_page)
            .unwrap_or(false),
        section_index: resolved_section_index(block, inherit),
    }
}

/// Index of the section a break starts: its own, or the one after the
/// section it inherits from.
pub fn resolved_section_index(block: &SectionBreakBlock, inherit: &SectionProps) -> usize {
    block
        .section_index
        .unwrap_or_else(|| inherit.section_index.saturating_add(1))
}

/// Run one section break through the state machine.
///
/// The first section of a document (no page exists yet) is applied to the
/// active slot immediately. Later sections are scheduled and the decision
/// tells the driver whether to break the page, enforce parity, or open a
/// new column region mid-page.
pub fn schedule_section_break(
    block: &SectionBreakBlock,
    state: &mut SectionState,
    metadata: Option<&SectionMetadata>,
    is_first_section: bool,
) -> SectionBreakDecision {
    let props = resolve_section_props(block, metadata, state.upcoming());

    if is_first_section {
        log::debug!(
            "section {} applied immediately (first section)",
            props.section_index
        );
        state.apply_now(props);
        return SectionBreakDecision::default();
    }

    let break_type = block.break_type.unwrap_or(SectionBreakType::NextPage);
    let columns_changed = !props.columns.same_shape(&state.active().columns);

    let decision = if block.require_page_boundary {
        SectionBreakDecision {
            force_page_break: true,
            required_parity: parity_of(break_type),
            ..Default::default()
        }
    } else {
        match break_type {
            SectionBreakType::NextPage => SectionBreakDecision {
                force_page_break: true,
                ..Default::default()
            },
            SectionBreakType::EvenPage | SectionBreakType::OddPage => SectionBreakDecision {
                force_page_break: true,
                required_parity: parity_of(break_type),
                ..Default::default()
            },
            SectionBreakType::Continuous if columns_changed => SectionBreakDecision {
                force_mid_page_region: true,
                ..Default::default()
            },
            SectionBreakType::Continuous => SectionBreakDecision::default(),
        }
    };

    log::debug!(
        "section {} ({:?}): {:?}",
        props.section_index,
        break_type,
        decision
    );

    let columns = props.columns.clone();
    state.schedule(props);
    if decision.force_mid_page_region {
        state.switch_columns(columns);
    }
    decision
}

fn parity_of(break_type: SectionBreakType) -> Option<Parity> {
    match break_type {
        SectionBreakType::EvenPage => Some(Parity::Even),
        SectionBreakType::OddPage => Some(Parity::Odd),
        _ => None,
    }
}

/// Map each section break to the next section break after it.
///
/// One import path stores a section's properties on the following break;
/// those breaks are flagged with `properties_from_next_section`.
pub fn build_section_lookahead(blocks: &[FlowBlock]) -> HashMap<usize, usize> {
    let mut lookahead = HashMap::new();
    let mut previous: Option<usize> = None;
    for (i, block) in blocks.iter().enumerate() {
        if matches!(block, FlowBlock::SectionBreak(_)) {
            if let Some(prev) = previous {
                lookahead.insert(prev, i);
            }
            previous = Some(i);
        }
    }
    lookahead
}

/// The section break block whose properties are authoritative for the
/// break at `index`.
pub fn effective_section_block<'a>(
    blocks: &'a [FlowBlock],
    index: usize,
    block: &'a SectionBreakBlock,
    lookahead: &HashMap<usize, usize>,
) -> Cow<'a, SectionBreakBlock> {
    if !block.properties_from_next_section {
        return Cow::Borrowed(block);
    }
    let next = lookahead.get(&index).and_then(|&j| match &blocks[j] {
        FlowBlock::SectionBreak(next) => Some(next),
        _ => None,
    });
    match next {
        Some(next) => Cow::Owned(SectionBreakBlock {
            id: block.id.clone(),
            break_type: block.break_type,
            require_page_boundary: block.require_page_boundary,
            section_index: block.section_index,
            properties_from_next_section: false,
            page_size: next.page_size.or(block.page_size),
            orientation: next.orientation.or(block.orientation),
            margins: next.margins.or(block.margins),
            columns: next.columns.clone().or_else(|| block.columns.clone()),
            vertical_align: next.vertical_align.or(block.vertical_align),
            numbering: next.numbering.or(block.numbering),
            header_refs: next.header_refs.clone().or_else(|| block.header_refs.clone()),
            footer_refs: next.footer_refs.clone().or_else(|| block.footer_refs.clone()),
            title_page: next.title_page.or(block.title_page),
        }),
        None => Cow::Borrowed(block),
    }
}

/// Pick the header/footer variant for a page.
pub fn select_variant(
    first_page_of_section: bool,
    title_page: bool,
    alternate_headers: bool,
    page_number: u32,
) -> HeaderFooterVariant {
    if first_page_of_section && title_page {
        HeaderFooterVariant::First
    } else if alternate_headers {
        if page_number % 2 == 0 {
            HeaderFooterVariant::Even
        } else {
            HeaderFooterVariant::Odd
        }
    } else {
        HeaderFooterVariant::Default
    }
}

/// Header/footer refs resolved for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRefs {
    pub variant: HeaderFooterVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer_ref: Option<String>,
}

/// Format a page number for display.
pub fn format_page_number(n: u32, format: NumberFormat) -> String {
    match format {
        NumberFormat::Decimal => n.to_string(),
        NumberFormat::LowerRoman => to_roman(n).to_lowercase(),
        NumberFormat::UpperRoman => to_roman(n),
        NumberFormat::LowerLetter => to_letters(n).to_lowercase(),
        NumberFormat::UpperLetter => to_letters(n),
        NumberFormat::NumberInDash => format!("- {} -", n),
    }
}

fn to_roman(mut n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, numeral) in TABLE {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

/// Word-processor letter numbering: A..Z, then AA..ZZ, then AAA...
fn to_letters(n: u32) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let letter = (b'A' + ((n - 1) % 26) as u8) as char;
    let repeat = ((n - 1) / 26 + 1) as usize;
    std::iter::repeat(letter).take(repeat).collect()
}

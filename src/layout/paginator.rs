//! # Paginator
//!
//! Owns the page list and the cursor on the page being filled. Every page
//! is created by [`Paginator::open_page`], which is the only place pending
//! section properties are committed, header/footer margins are inflated,
//! footnote space is reserved and page numbers are stamped. The driver
//! never builds pages itself.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::*;

use super::columns::{normalize_columns, NormalizedColumns};
use super::page_break::FIT_EPSILON;
use super::section::{format_page_number, select_variant, SectionRefs, SectionState};
use super::{Fragment, Page};

/// Where the column configuration changes mid-page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintBoundary {
    pub y: f64,
    pub columns: ColumnLayout,
}

/// The column region a page ended with. Kept on the page for the
/// post-layout passes.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionInfo {
    pub top: f64,
    pub content_left: f64,
    pub content_bottom: f64,
    pub columns: NormalizedColumns,
}

/// Cursor on the page being filled.
#[derive(Debug, Clone)]
pub struct PageState {
    pub page_number: u32,
    pub page_width: f64,
    pub page_height: f64,
    pub column_index: usize,
    pub cursor_y: f64,
    pub content_top: f64,
    pub content_bottom: f64,
    pub content_left: f64,
    pub content_width: f64,
    pub columns: NormalizedColumns,
    /// Top of the current column region.
    pub region_top: f64,
    /// Lowest cursor position reached by any column of the region.
    pub region_max_y: f64,
    pub constraint_boundaries: Vec<ConstraintBoundary>,
    /// Attributes of the paragraph placed last in this column, for
    /// spacing collapse.
    pub last_paragraph: Option<ParagraphAttrs>,
    /// Space after the last paragraph, already added to the cursor.
    pub trailing_spacing: f64,
    pub column_has_content: bool,
}

impl PageState {
    pub fn remaining(&self) -> f64 {
        self.content_bottom - self.cursor_y
    }

    /// Height of an empty column on this page.
    pub fn blank_capacity(&self) -> f64 {
        self.content_bottom - self.content_top
    }

    /// An empty column that starts at the top of the page's content box.
    /// Columns of a region opened part way down the page never qualify, so
    /// content that does not fit there moves on instead of overflowing the
    /// bottom margin.
    pub fn at_column_top(&self) -> bool {
        !self.column_has_content && self.region_top <= self.content_top + FIT_EPSILON
    }

    pub fn move_to(&mut self, y: f64) {
        self.cursor_y = y;
        self.region_max_y = self.region_max_y.max(y);
    }

    pub fn advance(&mut self, dy: f64) {
        self.move_to(self.cursor_y + dy);
    }

    pub fn column_left(&self) -> f64 {
        self.content_left + self.columns.offset(self.column_index)
    }

    pub fn column_width(&self) -> f64 {
        self.columns.column_width(self.column_index)
    }

    pub fn is_last_column(&self) -> bool {
        self.column_index + 1 >= self.columns.count
    }

    /// Forget spacing carried from the previous paragraph.
    pub fn reset_flow(&mut self) {
        self.last_paragraph = None;
        self.trailing_spacing = 0.0;
    }

    fn region(&self) -> RegionInfo {
        RegionInfo {
            top: self.region_top,
            content_left: self.content_left,
            content_bottom: self.content_bottom,
            columns: self.columns.clone(),
        }
    }
}

/// Numbering state before the most recent page was opened, so a blank
/// page can be reopened with different section properties.
#[derive(Debug, Clone, Copy)]
struct Bookmark {
    display_number: u32,
    current_section: Option<usize>,
}

pub struct Paginator<'a> {
    options: &'a LayoutOptions,
    pub(crate) section: SectionState,
    pages: Vec<Page>,
    state: Option<PageState>,
    display_number: u32,
    current_section: Option<usize>,
    bookmark: Option<Bookmark>,
}

impl<'a> Paginator<'a> {
    pub fn new(options: &'a LayoutOptions, section: SectionState) -> Self {
        Self {
            options,
            section,
            pages: Vec::new(),
            state: None,
            display_number: 0,
            current_section: None,
            bookmark: None,
        }
    }

    pub fn has_pages(&self) -> bool {
        !self.pages.is_empty()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn state(&self) -> Option<&PageState> {
        self.state.as_ref()
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    /// The current page, creating page 1 if none exists.
    pub fn ensure_page(&mut self) -> &mut PageState {
        let state = match self.state.take() {
            Some(state) => state,
            None => self.open_page(true),
        };
        self.state.insert(state)
    }

    /// Finish the current page and open the next one.
    pub fn start_new_page(&mut self) -> &mut PageState {
        let state = self.open_page(true);
        self.state.insert(state)
    }

    /// Open a page that keeps the current section (parity filler).
    pub fn start_filler_page(&mut self) -> &mut PageState {
        let state = self.open_page(false);
        self.state.insert(state)
    }

    /// Move to the next column, or to a new page from the last column.
    pub fn advance_column(&mut self) -> &mut PageState {
        match self.state.take() {
            Some(mut state) if !state.is_last_column() => {
                state.column_index += 1;
                state.cursor_y = state.region_top;
                state.column_has_content = false;
                state.reset_flow();
                log::debug!(
                    "page {}: advance to column {}",
                    state.page_number,
                    state.column_index
                );
                self.state.insert(state)
            }
            _ => self.start_new_page(),
        }
    }

    /// X origin of a column on the current page.
    pub fn column_x(&self, index: usize) -> f64 {
        match &self.state {
            Some(state) => state.content_left + state.columns.offset(index),
            None => self.options.margins.left,
        }
    }

    /// True when the current page has no fragments and the cursor never
    /// moved off the top of the first column.
    pub fn current_page_is_blank(&self) -> bool {
        match (&self.state, self.pages.last()) {
            (Some(state), Some(page)) => {
                page.fragments.is_empty()
                    && state.column_index == 0
                    && state.constraint_boundaries.is_empty()
                    && (state.cursor_y - state.content_top).abs() < 1e-6
            }
            _ => false,
        }
    }

    /// Throw away the current blank page and open it again, committing any
    /// pending section properties.
    pub fn reopen_current_page(&mut self) -> &mut PageState {
        if self.current_page_is_blank() {
            if let Some(page) = self.pages.pop() {
                if let Some(bookmark) = self.bookmark.take() {
                    self.display_number = bookmark.display_number;
                    self.current_section = bookmark.current_section;
                }
                log::debug!("reopening blank page {}", page.number);
            }
            self.state = None;
        }
        self.start_new_page()
    }

    /// Switch to the active column configuration at the cursor, opening a
    /// new constraint region. Starts a new page if the region would begin
    /// at or below the content bottom.
    pub fn begin_column_region(&mut self) -> &mut PageState {
        let columns = self.section.active().columns.clone();
        let Some(mut state) = self.state.take() else {
            return self.ensure_page();
        };

        let top = state.region_max_y.max(state.cursor_y);
        if top >= state.content_bottom {
            return self.start_new_page();
        }

        state.columns = normalize_columns(&columns, state.content_width);
        state.constraint_boundaries.push(ConstraintBoundary {
            y: top,
            columns: columns.clone(),
        });
        state.column_index = 0;
        state.region_top = top;
        state.region_max_y = top;
        state.cursor_y = top;
        state.column_has_content = false;
        state.reset_flow();
        log::debug!(
            "page {}: column region at y={} with {} column(s)",
            state.page_number,
            top,
            state.columns.count
        );

        if let Some(page) = self.pages.last_mut() {
            page.region = Some(state.region());
            page.constraint_boundaries = state.constraint_boundaries.clone();
        }
        self.state.insert(state)
    }

    /// Add an in-flow fragment to the current page.
    pub fn push_flow(&mut self, fragment: Fragment) {
        self.ensure_page().column_has_content = true;
        if let Some(page) = self.pages.last_mut() {
            page.fragments.push(fragment);
        }
    }

    /// Add a floating fragment. Floats do not count as column content.
    pub fn push_floating(&mut self, fragment: Fragment) {
        self.ensure_page();
        if let Some(page) = self.pages.last_mut() {
            page.fragments.push(fragment);
        }
    }

    /// The single page-creation path.
    fn open_page(&mut self, commit: bool) -> PageState {
        if commit && self.section.commit() {
            log::debug!(
                "committed pending section {}",
                self.section.active().section_index
            );
        }
        let props = self.section.active().clone();
        let number = self.pages.len() as u32 + 1;

        self.bookmark = Some(Bookmark {
            display_number: self.display_number,
            current_section: self.current_section,
        });
        let starts_section = self.current_section != Some(props.section_index);
        self.display_number = match (starts_section, props.numbering.start) {
            (true, Some(start)) => start,
            _ => self.display_number.saturating_add(1),
        };
        self.current_section = Some(props.section_index);

        let variant = select_variant(
            starts_section,
            props.title_page,
            self.options.alternate_headers,
            number,
        );
        let header_ref = props.header_refs.resolve(variant).map(str::to_string);
        let footer_ref = props.footer_refs.resolve(variant).map(str::to_string);
        let header_height = content_height(
            header_ref.as_deref(),
            &self.options.header_heights_by_ref,
            self.options.header_content_heights.get(variant),
        );
        let footer_height = content_height(
            footer_ref.as_deref(),
            &self.options.footer_heights_by_ref,
            self.options.footer_content_heights.get(variant),
        );

        let margins = inflate_margins(props.margins, header_height, footer_height);
        let reserved = self
            .options
            .footnote_reserved
            .get(&number)
            .copied()
            .unwrap_or(0.0)
            .max(0.0);

        let size = props.page_size;
        let content_top = margins.top;
        let content_bottom = (size.height - margins.bottom - reserved).max(content_top);
        let content_left = margins.left;
        let content_width = (size.width - margins.horizontal()).max(0.0);
        let columns = normalize_columns(&props.columns, content_width);

        let state = PageState {
            page_number: number,
            page_width: size.width,
            page_height: size.height,
            column_index: 0,
            cursor_y: content_top,
            content_top,
            content_bottom,
            content_left,
            content_width,
            columns,
            region_top: content_top,
            region_max_y: content_top,
            constraint_boundaries: Vec::new(),
            last_paragraph: None,
            trailing_spacing: 0.0,
            column_has_content: false,
        };

        let overridden = size != self.options.page_size;
        self.pages.push(Page {
            number,
            fragments: Vec::new(),
            margins,
            size: overridden.then_some(size),
            orientation: overridden.then_some(props.orientation),
            vertical_align: props.vertical_align,
            base_margins: props.vertical_align.map(|_| props.margins),
            number_text: Some(format_page_number(self.display_number, props.numbering.format)),
            section_index: Some(props.section_index),
            section_refs: SectionRefs {
                variant,
                header_ref,
                footer_ref,
            },
            columns: props.columns.clone(),
            constraint_boundaries: Vec::new(),
            region: Some(state.region()),
        });

        log::debug!(
            "opened page {} (section {}, display {}, {:?} header/footer, {} column(s))",
            number,
            props.section_index,
            self.display_number,
            variant,
            state.columns.count
        );

        state
    }
}

fn content_height(
    rel_id: Option<&str>,
    by_ref: &HashMap<String, f64>,
    by_variant: Option<f64>,
) -> f64 {
    rel_id
        .and_then(|id| by_ref.get(id).copied())
        .or(by_variant)
        .filter(|h| h.is_finite())
        .unwrap_or(0.0)
        .max(0.0)
}

/// Push the body below header content and above footer content.
pub fn inflate_margins(margins: PageMargins, header_height: f64, footer_height: f64) -> PageMargins {
    let mut used = margins;
    if header_height > 0.0 {
        used.top = margins.top.max(margins.header + header_height);
    }
    if footer_height > 0.0 {
        used.bottom = margins.bottom.max(margins.footer + footer_height);
    }
    used
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::section::SectionProps;

    fn paginator(options: &LayoutOptions) -> Paginator<'_> {
        Paginator::new(options, SectionState::new(SectionProps::from_options(options)))
    }

    #[test]
    fn ensure_page_creates_page_one_once() {
        let options = LayoutOptions::default();
        let mut p = paginator(&options);
        assert!(!p.has_pages());
        let state = p.ensure_page();
        assert_eq!(state.page_number, 1);
        assert_eq!(state.content_width, 468.0);
        assert_eq!(state.blank_capacity(), 648.0);
        p.ensure_page();
        assert_eq!(p.pages().len(), 1);
    }

    #[test]
    fn advance_column_then_page() {
        let options = LayoutOptions {
            columns: ColumnLayout::new(2, 48.0),
            ..Default::default()
        };
        let mut p = paginator(&options);
        p.ensure_page().advance(100.0);
        let state = p.advance_column();
        assert_eq!(state.column_index, 1);
        assert_eq!(state.cursor_y, 72.0);
        assert_eq!(state.page_number, 1);
        assert_eq!(p.column_x(1), 72.0 + 258.0);

        let state = p.advance_column();
        assert_eq!(state.page_number, 2);
        assert_eq!(state.column_index, 0);
    }

    #[test]
    fn header_content_inflates_top_margin() {
        let options = LayoutOptions {
            header_content_heights: VariantHeights {
                default: Some(60.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut p = paginator(&options);
        let state = p.ensure_page();
        // max(72, 36 + 60)
        assert_eq!(state.content_top, 96.0);
        assert_eq!(p.pages()[0].margins.top, 96.0);
    }

    #[test]
    fn heights_by_ref_take_precedence() {
        let mut options = LayoutOptions {
            footer_content_heights: VariantHeights {
                default: Some(10.0),
                ..Default::default()
            },
            ..Default::default()
        };
        options.footer_heights_by_ref.insert("rFooter".into(), 50.0);
        options.sections.push(SectionMetadata {
            index: 0,
            footer_refs: Some(HeaderFooterRefs {
                default: Some("rFooter".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let mut p = paginator(&options);
        let state = p.ensure_page();
        // bottom = max(72, 36 + 50) = 86
        assert_eq!(state.content_bottom, 792.0 - 86.0);
        assert_eq!(p.pages()[0].section_refs.footer_ref.as_deref(), Some("rFooter"));
    }

    #[test]
    fn footnote_reservation_applies_to_its_page_only() {
        let mut options = LayoutOptions::default();
        options.footnote_reserved.insert(2, 40.0);
        let mut p = paginator(&options);
        assert_eq!(p.ensure_page().content_bottom, 720.0);
        assert_eq!(p.start_new_page().content_bottom, 680.0);
        assert_eq!(p.start_new_page().content_bottom, 720.0);
    }

    #[test]
    fn column_region_opens_below_lowest_column() {
        let options = LayoutOptions::default();
        let mut p = paginator(&options);
        p.ensure_page().advance(200.0);
        p.section.switch_columns(ColumnLayout::new(2, 20.0));
        let state = p.begin_column_region();
        assert_eq!(state.region_top, 272.0);
        assert_eq!(state.columns.count, 2);
        assert_eq!(state.constraint_boundaries.len(), 1);
        assert_eq!(p.pages().len(), 1);

        // Second column starts at the region top, not the page top.
        let state = p.advance_column();
        assert_eq!(state.cursor_y, 272.0);
        assert!(!state.at_column_top());
    }

    #[test]
    fn only_a_full_blank_column_is_at_top() {
        let options = LayoutOptions {
            columns: ColumnLayout::new(2, 48.0),
            ..Default::default()
        };
        let mut p = paginator(&options);
        assert!(p.ensure_page().at_column_top());
        let state = p.ensure_page();
        state.advance(20.0);
        state.column_has_content = true;
        assert!(!state.at_column_top());
        assert!(p.advance_column().at_column_top());
    }

    #[test]
    fn display_number_saturates() {
        let options = LayoutOptions {
            sections: vec![SectionMetadata {
                index: 0,
                numbering: Some(PageNumbering {
                    format: NumberFormat::Decimal,
                    start: Some(u32::MAX),
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        let mut p = paginator(&options);
        p.ensure_page();
        p.start_new_page();
        let max = u32::MAX.to_string();
        assert_eq!(p.pages()[0].number_text.as_deref(), Some(max.as_str()));
        assert_eq!(p.pages()[1].number_text.as_deref(), Some(max.as_str()));
    }

    #[test]
    fn reopening_a_blank_page_keeps_numbering_contiguous() {
        let options = LayoutOptions::default();
        let mut p = paginator(&options);
        p.ensure_page();
        p.start_new_page();
        assert!(p.current_page_is_blank());
        let state = p.reopen_current_page();
        assert_eq!(state.page_number, 2);
        assert_eq!(p.pages().len(), 2);
        assert_eq!(p.pages()[1].number_text.as_deref(), Some("2"));
    }

    #[test]
    fn inflation_only_with_positive_content() {
        let m = PageMargins {
            top: 20.0,
            header: 40.0,
            ..Default::default()
        };
        assert_eq!(inflate_margins(m, 0.0, 0.0).top, 20.0);
        assert_eq!(inflate_margins(m, 10.0, 0.0).top, 50.0);
    }
}

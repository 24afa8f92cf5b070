//! # Folio
//!
//! A pagination engine for word-processor documents.
//!
//! A text editor knows how tall every line of a paragraph is once it has
//! shaped the text. What it doesn't know is where the page breaks fall:
//! which paragraphs stay together, where a table splits and repeats its
//! header, what a section break does to the page after it, how text wraps
//! around a floating picture, and which header goes on which page. Folio
//! answers exactly those questions and nothing else.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API): blocks + measures + options
//!       ↓
//!   [model]    — Flow blocks, measures, page/section options
//!       ↓
//!   [layout]   — Section state machine, keep-with-next chains,
//!                floats, paginator, column balancing
//!       ↓
//!   Layout: pages of positioned fragments
//! ```
//!
//! Measurement and painting stay with the caller. Every layout call is
//! independent and deterministic: the same input always yields the same
//! pages.

pub mod error;
pub mod layout;
pub mod model;

use error::{FolioError, Result};
use layout::{HeaderFooterLayout, Layout, LayoutEngine};
use model::{HeaderFooterConstraints, LayoutInput};

/// Lay out a document body.
pub fn layout(input: &LayoutInput) -> Result<Layout> {
    LayoutEngine::new().layout_document(&input.blocks, &input.measures, &input.options)
}

/// Lay out a document body described as JSON.
pub fn layout_json(json: &str) -> Result<Layout> {
    let input: LayoutInput = serde_json::from_str(json)?;
    layout(&input)
}

/// Lay out header or footer content described as JSON inside a fixed box.
/// The input's options are ignored.
pub fn layout_header_footer_json(
    json: &str,
    constraints: &HeaderFooterConstraints,
) -> Result<HeaderFooterLayout> {
    let input: LayoutInput = serde_json::from_str(json)?;
    LayoutEngine::new().layout_header_footer(&input.blocks, &input.measures, constraints)
}

/// Serialize any layout result as pretty-printed JSON.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(FolioError::Serialize)
}

//! # Floating Objects
//!
//! Anchored images, drawings and tables carve exclusion zones out of the
//! page. Body text asks the manager two questions while it is placed:
//!
//! - what horizontal band is free for a line box at `y` with height `h`
//!   (square/tight/through wrapping narrows the band from one side), and
//! - is that vertical span blocked outright (top-and-bottom wrapping, or a
//!   side zone that leaves no usable width), and if so until where.
//!
//! Zones are remembered per page. They are local to one layout call.

use serde::Serialize;

use crate::model::{Wrap, WrapKind, WrapSide};

/// Narrower free bands than this are treated as fully blocked.
const MIN_BAND_WIDTH: f64 = 1.0;

/// Height used to sample a band at a single y.
const SAMPLE_HEIGHT: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// A rectangle body text must flow around.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionZone {
    pub page_number: u32,
    /// Column that was active when the zone was registered.
    pub column: usize,
    pub block_id: String,
    pub rect: Rect,
    pub wrap: Wrap,
}

impl ExclusionZone {
    fn top(&self) -> f64 {
        self.rect.y - self.wrap.dist_top
    }

    fn bottom(&self) -> f64 {
        self.rect.bottom() + self.wrap.dist_bottom
    }

    fn left(&self) -> f64 {
        self.rect.x - self.wrap.dist_left
    }

    fn right(&self) -> f64 {
        self.rect.right() + self.wrap.dist_right
    }

    fn overlaps(&self, left: f64, right: f64, y: f64, height: f64) -> bool {
        let vertical = self.top() < y + height && self.bottom() > y;
        let horizontal = self.left() < right && self.right() > left;
        vertical && horizontal
    }
}

/// The free horizontal band for a line box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub x: f64,
    pub width: f64,
}

#[derive(Debug, Default)]
pub struct FloatManager {
    zones: Vec<ExclusionZone>,
}

impl FloatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone. Objects that do not wrap text are ignored.
    pub fn register(
        &mut self,
        page_number: u32,
        column: usize,
        block_id: &str,
        rect: Rect,
        wrap: Wrap,
    ) {
        if wrap.kind == WrapKind::None {
            return;
        }
        log::debug!(
            "exclusion zone for {} on page {} column {}: {:?} ({:?})",
            block_id,
            page_number,
            column,
            rect,
            wrap.kind
        );
        self.zones.push(ExclusionZone {
            page_number,
            column,
            block_id: block_id.to_string(),
            rect,
            wrap,
        });
    }

    pub fn zones_on(&self, page_number: u32) -> impl Iterator<Item = &ExclusionZone> {
        self.zones
            .iter()
            .filter(move |z| z.page_number == page_number)
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Free band inside `[left, left + width)` for a line box spanning
    /// `[y, y + height)`.
    pub fn available_band(
        &self,
        page_number: u32,
        left: f64,
        width: f64,
        y: f64,
        height: f64,
    ) -> Band {
        let mut band_left = left;
        let mut band_right = left + width;

        for zone in self.zones_on(page_number) {
            if matches!(zone.wrap.kind, WrapKind::None | WrapKind::TopAndBottom) {
                continue;
            }
            if !zone.overlaps(band_left, band_right, y, height) {
                continue;
            }
            let space_left = zone.left() - band_left;
            let space_right = band_right - zone.right();
            let keep_left = match zone.wrap.side {
                WrapSide::Left => true,
                WrapSide::Right => false,
                WrapSide::BothSides | WrapSide::Largest => space_left >= space_right,
            };
            if keep_left {
                band_right = band_right.min(zone.left());
            } else {
                band_left = band_left.max(zone.right());
            }
        }

        Band {
            x: band_left,
            width: (band_right - band_left).max(0.0),
        }
    }

    /// If a line box at `[y, y + height)` inside `[left, left + width)`
    /// cannot be placed because of exclusion zones, the y where it can
    /// resume.
    pub fn blocked_until(
        &self,
        page_number: u32,
        left: f64,
        width: f64,
        y: f64,
        height: f64,
    ) -> Option<f64> {
        let right = left + width;
        let mut resume: Option<f64> = None;

        for zone in self.zones_on(page_number) {
            if zone.wrap.kind != WrapKind::TopAndBottom {
                continue;
            }
            if zone.overlaps(left, right, y, height) {
                resume = Some(resume.map_or(zone.bottom(), |r: f64| r.max(zone.bottom())));
            }
        }

        let band = self.available_band(page_number, left, width, y, height);
        if resume.is_none() && band.width < MIN_BAND_WIDTH {
            // Side zones leave no room: resume below the lowest one that overlaps.
            resume = self
                .zones_on(page_number)
                .filter(|z| z.wrap.kind != WrapKind::None && z.overlaps(left, right, y, height))
                .map(|z| z.bottom())
                .reduce(f64::max);
        }

        resume.filter(|r| *r > y)
    }

    /// Narrowest free band over a vertical span, sampled at each zone edge.
    pub fn narrowest_band(
        &self,
        page_number: u32,
        left: f64,
        width: f64,
        y: f64,
        height: f64,
    ) -> Band {
        let mut narrowest = self.available_band(page_number, left, width, y, SAMPLE_HEIGHT);
        for zone in self.zones_on(page_number) {
            let top = zone.top();
            if top > y && top < y + height {
                let band = self.available_band(page_number, left, width, top, SAMPLE_HEIGHT);
                if band.width < narrowest.width {
                    narrowest = band;
                }
            }
        }
        let whole = self.available_band(page_number, left, width, y, height);
        if whole.width < narrowest.width {
            narrowest = whole;
        }
        narrowest
    }
}

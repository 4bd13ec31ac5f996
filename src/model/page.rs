//! Page-level types.

use serde::{Deserialize, Serialize};

use super::PageImage;
use crate::error::{Error, Result};

/// Native PDF resolution in points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Rectangle enclosing one text span, in page-space points.
///
/// The origin is the top-left corner of the page and `y` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BoundingBox {
    /// Create a bounding box from its corners.
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Whether all four coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Smallest box containing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

impl From<(f32, f32, f32, f32)> for BoundingBox {
    fn from((x0, y0, x1, y1): (f32, f32, f32, f32)) -> Self {
        Self::new(x0, y0, x1, y1)
    }
}

/// One extracted text span with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Literal span text
    pub text: String,
    /// Span bounds
    pub bbox: BoundingBox,
}

impl TextBlock {
    /// Create a new text block.
    pub fn new(text: impl Into<String>, bbox: impl Into<BoundingBox>) -> Self {
        Self {
            text: text.into(),
            bbox: bbox.into(),
        }
    }
}

/// A single processed page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Render scale relative to the native 72 DPI
    pub zoom_factor: f32,

    /// Linear page text as reported by the document library
    pub raw_text: String,

    /// Rendered page image
    pub image: PageImage,

    /// Text spans in extraction order
    pub text_blocks: Vec<TextBlock>,
}

impl Page {
    /// Zoom factor for rendering at the given DPI.
    pub fn zoom_for_dpi(dpi: f32) -> f32 {
        dpi / POINTS_PER_INCH
    }

    /// DPI the page image was rendered at.
    pub fn dpi(&self) -> f32 {
        self.zoom_factor * POINTS_PER_INCH
    }

    /// Page dimensions as (width, height) tuple.
    pub fn dimensions(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Check if the page is in landscape orientation.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    /// Whether the page yielded no text spans.
    pub fn has_text(&self) -> bool {
        !self.text_blocks.is_empty()
    }

    /// Text blocks whose bounds intersect the given region.
    pub fn blocks_in(&self, region: &BoundingBox) -> impl Iterator<Item = &TextBlock> + '_ {
        let region = *region;
        self.text_blocks.iter().filter(move |b| {
            b.bbox.x0 < region.x1
                && b.bbox.x1 > region.x0
                && b.bbox.y0 < region.y1
                && b.bbox.y1 > region.y0
        })
    }

    /// Check that every measurement is finite and the image is a PNG of
    /// its stated size.
    pub fn validate(&self) -> Result<()> {
        let number = self.page_number;
        if !self.width.is_finite() || !self.height.is_finite() {
            return Err(Error::page(
                number,
                format!("non-finite page size {}x{}", self.width, self.height),
            ));
        }
        if !self.zoom_factor.is_finite() {
            return Err(Error::page(
                number,
                format!("non-finite zoom factor {}", self.zoom_factor),
            ));
        }
        if let Some(block) = self.text_blocks.iter().find(|b| !b.bbox.is_finite()) {
            return Err(Error::page(
                number,
                format!("non-finite bounds for text {:?}", block.text),
            ));
        }
        self.image.validate().map_err(|e| e.at_page(number))
    }
}

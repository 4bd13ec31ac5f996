//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for the document library, isolating the
//! concrete implementation (Pdfium) from the extraction and caching logic.

use std::path::Path;

use crate::error::Result;
use crate::model::{BoundingBox, PageImage};

/// Kind of a top-level content block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Text content (lines of spans)
    Text,
    /// Image content; never contributes text
    Image,
}

/// Smallest unit of extracted text.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSpan {
    pub text: String,
    pub bbox: BoundingBox,
}

/// A line of spans.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentLine {
    pub spans: Vec<ContentSpan>,
}

/// A top-level node of a page's structured content tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentBlock {
    pub kind: BlockKind,
    pub lines: Vec<ContentLine>,
}

impl ContentBlock {
    /// Text block from lines.
    pub fn text(lines: Vec<ContentLine>) -> Self {
        Self {
            kind: BlockKind::Text,
            lines,
        }
    }

    /// Image block; carries no lines.
    pub fn image() -> Self {
        Self {
            kind: BlockKind::Image,
            lines: Vec::new(),
        }
    }
}

/// Group spans in reading order into lines and blocks.
///
/// For libraries that only report flat text runs. A span starts a new line
/// when it does not vertically overlap the current line by at least half of
/// the smaller height; a line starts a new block when the gap above it is
/// larger than its own height.
pub fn blocks_from_spans(spans: Vec<ContentSpan>) -> Vec<ContentBlock> {
    // (line bounds, spans)
    let mut lines: Vec<(BoundingBox, Vec<ContentSpan>)> = Vec::new();

    for span in spans {
        match lines.last_mut() {
            Some((bounds, line)) if same_line(bounds, &span.bbox) => {
                *bounds = bounds.union(&span.bbox);
                line.push(span);
            }
            _ => lines.push((span.bbox, vec![span])),
        }
    }

    let mut blocks = Vec::new();
    let mut current: Vec<ContentLine> = Vec::new();
    let mut prev: Option<BoundingBox> = None;

    for (bounds, spans) in lines {
        if let Some(prev) = prev {
            if bounds.y0 - prev.y1 > bounds.height().max(0.0) && !current.is_empty() {
                blocks.push(ContentBlock::text(std::mem::take(&mut current)));
            }
        }
        current.push(ContentLine { spans });
        prev = Some(bounds);
    }
    if !current.is_empty() {
        blocks.push(ContentBlock::text(current));
    }
    blocks
}

fn same_line(line: &BoundingBox, span: &BoundingBox) -> bool {
    let overlap = line.y1.min(span.y1) - line.y0.max(span.y0);
    overlap >= line.height().min(span.height()) * 0.5
}

/// Everything the document library reports for one page.
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Native width in points
    pub width: f32,
    /// Native height in points
    pub height: f32,
    /// Linear page text
    pub text: String,
    /// Structured content tree in library reading order
    pub blocks: Vec<ContentBlock>,
    /// Page rendered at the requested zoom
    pub image: PageImage,
}

/// Abstract interface for document access.
///
/// Implementations must allow `load_page` to be called for different pages
/// from several threads at once; either the handle is safely shareable or
/// each call opens its own.
pub trait PdfBackend: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Load page `index` (0-based) and render it at `zoom` × 72 DPI.
    fn load_page(&self, index: u32, zoom: f32) -> Result<RawPage>;

    /// Most concurrent `load_page` calls that can make progress, if limited.
    ///
    /// A backend that serializes its calls returns `Some(1)` and is then
    /// driven sequentially.
    fn max_parallelism(&self) -> Option<usize> {
        None
    }
}

/// Opens documents for a [`PdfBackend`].
pub trait BackendLoader: Send + Sync {
    /// Open the document at `path`.
    fn open(&self, path: &Path) -> Result<Box<dyn PdfBackend>>;
}

impl<F> BackendLoader for F
where
    F: Fn(&Path) -> Result<Box<dyn PdfBackend>> + Send + Sync,
{
    fn open(&self, path: &Path) -> Result<Box<dyn PdfBackend>> {
        self(path)
    }
}

//! Page extraction.
//!
//! Drives a [`PdfBackend`] over every page of a document and assembles the
//! results into [`Page`]s. Pages share no mutable state, so they can be
//! extracted on a worker pool; results always come back in page order.

use std::path::Path;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::model::{Document, Page, TextBlock};

use super::backend::{BlockKind, ContentBlock, PdfBackend};
use super::options::ExtractOptions;

/// Extracts pages from a backend according to [`ExtractOptions`].
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    /// Create an extractor with the given options.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// The options this extractor runs with.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract every page of the document.
    ///
    /// A document without pages is a processing error. A failure while
    /// loading a page is reported with that page's number.
    pub fn extract(&self, backend: &dyn PdfBackend) -> Result<Vec<Page>> {
        self.options.validate()?;
        self.options.cancel.check()?;

        let count = backend.page_count();
        if count == 0 {
            return Err(Error::processing("document has no pages"));
        }

        let zoom = self.options.zoom_factor();
        log::debug!("Extracting {} pages at zoom {:.4}", count, zoom);

        let workers = match backend.max_parallelism() {
            Some(limit) if self.options.max_workers == 0 => limit.max(1),
            Some(limit) => self.options.max_workers.min(limit.max(1)),
            None => self.options.max_workers,
        };

        let result = if self.options.parallel && count > 1 && workers != 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("takeoff-page-{}", i))
                .build()
                .map_err(|e| Error::processing(format!("failed to start worker pool: {}", e)))?;

            pool.install(|| {
                (0..count)
                    .into_par_iter()
                    .map(|index| self.extract_page(backend, index, count, zoom))
                    .collect::<Result<Vec<_>>>()
            })
        } else {
            (0..count)
                .map(|index| self.extract_page(backend, index, count, zoom))
                .collect::<Result<Vec<_>>>()
        };

        // In-flight results are dropped once cancellation was requested
        self.options.cancel.check()?;
        result
    }

    /// Extract a whole document whose digest is already known.
    pub fn extract_document(
        &self,
        path: &Path,
        backend: &dyn PdfBackend,
        content_digest: impl Into<String>,
    ) -> Result<Document> {
        let source_name = source_name(path);
        log::debug!("Begin processing {} ...", source_name);

        let pages = self.extract(backend)?;
        let document = Document::new(source_name, content_digest, pages);

        log::info!(
            "Processed {} ({} pages, {} text spans)",
            document.source_name,
            document.page_count(),
            document.text_block_count()
        );
        Ok(document)
    }

    fn extract_page(
        &self,
        backend: &dyn PdfBackend,
        index: u32,
        count: u32,
        zoom: f32,
    ) -> Result<Page> {
        self.options.cancel.check()?;

        let page_number = index + 1;
        log::debug!("Processing page {}/{}", page_number, count);

        let raw = backend
            .load_page(index, zoom)
            .map_err(|e| e.at_page(page_number))?;
        log::debug!(
            "Extracted {} chars and {} blocks from page {}",
            raw.text.len(),
            raw.blocks.len(),
            page_number
        );

        let text_blocks = flatten_blocks(&raw.blocks);
        log::debug!(
            "Page {}: {} text spans, image {}x{} ({} bytes)",
            page_number,
            text_blocks.len(),
            raw.image.width,
            raw.image.height,
            raw.image.size()
        );

        self.options.cancel.check()?;

        Ok(Page {
            page_number,
            width: raw.width,
            height: raw.height,
            zoom_factor: zoom,
            raw_text: raw.text,
            image: raw.image,
            text_blocks,
        })
    }
}

/// Flatten a content tree into text blocks.
///
/// Only text blocks contribute; each span becomes one [`TextBlock`] in
/// block → line → span order.
pub fn flatten_blocks(blocks: &[ContentBlock]) -> Vec<TextBlock> {
    blocks
        .iter()
        .filter(|block| block.kind == BlockKind::Text)
        .flat_map(|block| block.lines.iter())
        .flat_map(|line| line.spans.iter())
        .map(|span| TextBlock::new(span.text.clone(), span.bbox))
        .collect()
}

/// File name component of a path, used as the document's source name.
pub(crate) fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

//! Document-level types.

use super::Page;
use crate::digest::is_valid_digest;
use crate::error::{Error, Result};

/// A processed PDF document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// File name of the source document
    pub source_name: String,

    /// sha-256 hex digest of the source bytes; the cache key
    pub content_digest: String,

    /// Pages in order, `pages[i].page_number == i + 1`
    pub pages: Vec<Page>,
}

impl Document {
    /// Create a document from already-extracted pages.
    pub fn new(
        source_name: impl Into<String>,
        content_digest: impl Into<String>,
        pages: Vec<Page>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            content_digest: content_digest.into(),
            pages,
        }
    }

    /// Get the number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn page(&self, page_number: u32) -> Option<&Page> {
        if page_number == 0 {
            return None;
        }
        self.pages.get((page_number - 1) as usize)
    }

    /// Total number of text spans across all pages.
    pub fn text_block_count(&self) -> usize {
        self.pages.iter().map(|p| p.text_blocks.len()).sum()
    }

    /// Get plain text content of the entire document.
    pub fn plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.raw_text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Check the structural invariants.
    ///
    /// The digest must be 64 lowercase hex characters, there must be at least
    /// one page, and page numbers must run 1, 2, 3, ... in order. Each page
    /// must also pass [`Page::validate`].
    pub fn validate(&self) -> Result<()> {
        if !is_valid_digest(&self.content_digest) {
            return Err(Error::InvalidDigest(self.content_digest.clone()));
        }
        if self.pages.is_empty() {
            return Err(Error::processing("document has no pages"));
        }
        for (index, page) in self.pages.iter().enumerate() {
            let expected = index as u32 + 1;
            if page.page_number != expected {
                return Err(Error::processing(format!(
                    "page at position {} is numbered {}",
                    expected, page.page_number
                )));
            }
            page.validate()?;
        }
        Ok(())
    }
}

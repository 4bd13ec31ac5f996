//! # takeoff
//!
//! Page extraction for PDF documents with a content-addressed disk cache.
//!
//! Every page yields its raw text, the text spans with their bounding boxes,
//! and a rendered PNG image. Results are cached under the SHA-256 digest of
//! the input bytes, so processing the same file again is served from disk.
//!
//! ## Quick Start
//!
//! ```no_run
//! use takeoff::Takeoff;
//!
//! fn main() -> takeoff::Result<()> {
//!     let processed = Takeoff::new()
//!         .with_cache_dir("./.cache")
//!         .with_dpi(150.0)
//!         .process("drawings.pdf")?;
//!
//!     for page in &processed.document.pages {
//!         println!("page {}: {} spans", page.page_number, page.text_blocks.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Text spans with positions**: one [`TextBlock`] per span, in reading order
//! - **Page renders**: PNG at a configurable DPI
//! - **Content-addressed cache**: JSON records plus shared, deduplicated images
//! - **Parallel processing**: Uses Rayon for multi-page documents
//! - **Cancellation**: abort a running extraction through a [`CancelToken`]

pub mod cache;
pub mod detect;
pub mod digest;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;

// Re-export commonly used types
pub use cache::{CacheStore, DocumentRecord, PageRecord};
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use digest::{digest_bytes, digest_file, digest_reader, is_valid_digest};
pub use error::{Error, Result};
pub use model::{BoundingBox, Document, Page, PageImage, TextBlock};
pub use parser::{BackendLoader, CancelToken, ExtractOptions, Extractor, PdfBackend};
#[cfg(feature = "pdfium")]
pub use parser::{PdfiumBackend, PdfiumLoader};
pub use pipeline::{Origin, Pipeline, Processed};

use std::path::{Path, PathBuf};

/// Extract every page of a PDF file, bypassing the cache.
///
/// # Example
///
/// ```no_run
/// let doc = takeoff::extract_file("drawings.pdf").unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
#[cfg(feature = "pdfium")]
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    Takeoff::new().no_cache().process(path).map(|p| p.document)
}

/// Builder for processing PDF documents through the cache.
///
/// # Example
///
/// ```no_run
/// use takeoff::Takeoff;
///
/// let processed = Takeoff::new()
///     .with_cache_dir("/var/cache/takeoff")
///     .with_max_workers(4)
///     .refresh()
///     .process("drawings.pdf")?;
/// println!("{} ({})", processed.document.source_name, processed.origin.as_str());
/// # Ok::<(), takeoff::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Takeoff {
    options: ExtractOptions,
    cache_dir: PathBuf,
    use_cache: bool,
    refresh: bool,
    pdfium_library: Option<PathBuf>,
}

impl Takeoff {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            options: ExtractOptions::default(),
            cache_dir: CacheStore::default_root(),
            use_cache: true,
            refresh: false,
            pdfium_library: None,
        }
    }

    /// Set the cache root directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set rendering resolution in dots per inch.
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.options = self.options.with_dpi(dpi);
        self
    }

    /// Limit the number of page worker threads.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.options = self.options.with_max_workers(workers);
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.options = self.options.sequential();
        self
    }

    /// Ignore existing cache entries; fresh results are still stored.
    pub fn refresh(mut self) -> Self {
        self.refresh = true;
        self
    }

    /// Neither read nor write the cache.
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Abort processing when `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.options = self.options.with_cancel_token(token);
        self
    }

    /// Load Pdfium from `dir` instead of the system library path.
    pub fn with_pdfium_library(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pdfium_library = Some(dir.into());
        self
    }

    /// The extraction options in effect.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// The cache store, unless caching is disabled.
    pub fn cache(&self) -> Option<CacheStore> {
        self.use_cache.then(|| CacheStore::new(&self.cache_dir))
    }

    /// Build a pipeline over another document library.
    pub fn pipeline<B: BackendLoader>(&self, loader: B) -> Pipeline<B> {
        let pipeline = Pipeline::new(loader, self.options.clone()).refresh(self.refresh);
        match self.cache() {
            Some(store) => pipeline.with_cache(store),
            None => pipeline.without_cache(),
        }
    }

    /// Process a PDF file with Pdfium.
    #[cfg(feature = "pdfium")]
    pub fn process<P: AsRef<Path>>(&self, path: P) -> Result<Processed> {
        let loader = match &self.pdfium_library {
            Some(dir) => PdfiumLoader::with_library_dir(dir),
            None => PdfiumLoader::new(),
        };
        self.pipeline(loader).process(path)
    }

    /// Process a PDF file on tokio's blocking pool.
    #[cfg(all(feature = "async", feature = "pdfium"))]
    pub async fn process_async(&self, path: impl Into<PathBuf>) -> Result<Processed> {
        let this = self.clone();
        let path = path.into();
        tokio::task::spawn_blocking(move || this.process(&path))
            .await
            .map_err(|e| Error::processing(format!("processing task failed: {}", e)))?
    }
}

impl Default for Takeoff {
    fn default() -> Self {
        Self::new()
    }
}

//! [`PdfBackend`] backed by Pdfium.
//!
//! Pdfium is loaded at runtime, either from the system library search path
//! or from a configured directory. The native library is not thread-safe:
//! every page call binds the library, opens a fresh document and drops both
//! afterwards, with calls serialized through a mutex. The backend therefore
//! reports a parallelism of one and pages are loaded on the calling thread.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use pdfium_render::prelude::*;

use crate::detect::detect_format_from_path;
use crate::error::{Error, Result};
use crate::model::{BoundingBox, PageImage};

use super::backend::{
    blocks_from_spans, BackendLoader, ContentBlock, ContentSpan, PdfBackend, RawPage,
};

/// Opens documents with Pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumLoader {
    library_dir: Option<PathBuf>,
}

impl PdfiumLoader {
    /// Bind to the system Pdfium library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the Pdfium library found in `dir`.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }
}

impl BackendLoader for PdfiumLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfBackend>> {
        let backend = PdfiumBackend::open(path, self.library_dir.clone())?;
        Ok(Box::new(backend))
    }
}

/// Concrete [`PdfBackend`] backed by Pdfium.
#[derive(Debug)]
pub struct PdfiumBackend {
    path: PathBuf,
    library_dir: Option<PathBuf>,
    page_count: u32,
    lock: Mutex<()>,
}

impl PdfiumBackend {
    /// Open a PDF file and read its page count.
    pub fn open<P: AsRef<Path>>(path: P, library_dir: Option<PathBuf>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = detect_format_from_path(&path)?;
        log::debug!("Opening {} ({})", path.display(), format);

        let pdfium = bind_pdfium(library_dir.as_deref())?;
        let document = pdfium
            .load_pdf_from_file(&path, None)
            .map_err(|e| Error::processing(format!("failed to open {}: {}", path.display(), e)))?;
        let page_count = u32::from(document.pages().len());
        log::debug!("Found {} pages in {}", page_count, path.display());
        drop(document);

        Ok(Self {
            path,
            library_dir,
            page_count,
            lock: Mutex::new(()),
        })
    }

    /// Path of the opened document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn max_parallelism(&self) -> Option<usize> {
        Some(1)
    }

    fn load_page(&self, index: u32, zoom: f32) -> Result<RawPage> {
        let page_index = u16::try_from(index)
            .map_err(|_| Error::processing(format!("page index {} out of range", index)))?;

        let _guard = self.lock.lock();
        let pdfium = bind_pdfium(self.library_dir.as_deref())?;
        let document = pdfium.load_pdf_from_file(&self.path, None)?;
        let page = document.pages().get(page_index)?;

        let width = page.width().value;
        let height = page.height().value;

        let text_page = page.text()?;
        let text = text_page.all();

        // Pdfium reports bottom-left origin; flip to top-left
        let spans = text_page
            .segments()
            .iter()
            .map(|segment| {
                let rect = segment.bounds();
                ContentSpan {
                    text: segment.text(),
                    bbox: BoundingBox::new(
                        rect.left().value,
                        height - rect.top().value,
                        rect.right().value,
                        height - rect.bottom().value,
                    ),
                }
            })
            .filter(|span| !span.text.is_empty())
            .collect::<Vec<_>>();

        let mut blocks = blocks_from_spans(spans);
        let image_count = page
            .objects()
            .iter()
            .filter(|object| object.object_type() == PdfPageObjectType::Image)
            .count();
        blocks.extend((0..image_count).map(|_| ContentBlock::image()));

        let config = PdfRenderConfig::new().scale_page_by_factor(zoom);
        let bitmap = page.render_with_config(&config)?;
        let image = PageImage::from_rgba(
            pixels(bitmap.width())?,
            pixels(bitmap.height())?,
            bitmap.as_rgba_bytes(),
        )?;

        Ok(RawPage {
            width,
            height,
            text,
            blocks,
            image,
        })
    }
}

fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium> {
    let bindings = match library_dir {
        Some(dir) => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Error::processing(format!("failed to load pdfium library: {}", e)))?;
    Ok(Pdfium::new(bindings))
}

fn pixels(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::processing(format!("invalid bitmap size {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_non_pdf_before_binding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"plain text, not a pdf").unwrap();

        let err = PdfiumLoader::new().open(&path).err().unwrap();
        assert!(matches!(err, Error::Processing { page: None, .. }));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PdfiumBackend::open(dir.path().join("missing.pdf"), None).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_pixels() {
        assert_eq!(pixels(640).unwrap(), 640);
        assert!(pixels(-1).is_err());
    }

    #[test]
    fn test_backend_is_driven_sequentially() {
        let backend = PdfiumBackend {
            path: PathBuf::from("plan.pdf"),
            library_dir: None,
            page_count: 12,
            lock: Mutex::new(()),
        };
        assert_eq!(backend.max_parallelism(), Some(1));
        assert_eq!(backend.page_count(), 12);
    }
}

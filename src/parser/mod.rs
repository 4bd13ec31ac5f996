//! Page extraction module.

pub mod backend;
mod extractor;
mod options;
#[cfg(feature = "pdfium")]
mod pdfium;

pub use backend::{
    blocks_from_spans, BackendLoader, BlockKind, ContentBlock, ContentLine, ContentSpan,
    PdfBackend, RawPage,
};
pub use extractor::{flatten_blocks, Extractor};
pub(crate) use extractor::source_name;
pub use options::{CancelToken, ExtractOptions, DEFAULT_DPI};
#[cfg(feature = "pdfium")]
pub use pdfium::{PdfiumBackend, PdfiumLoader};

//! Error types for takeoff library.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for takeoff operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting or caching documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when opening, reading or writing a file.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory the operation was acting on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Extraction failed, optionally scoped to a 1-indexed page.
    #[error("{}", processing_message(*page, message))]
    Processing {
        /// Page number (1-indexed) when the failure is page-scoped
        page: Option<u32>,
        /// Description of the failure
        message: String,
    },

    /// No cache entry exists for the digest.
    #[error("No cache entry for {digest}")]
    CacheMiss {
        /// Digest that was looked up
        digest: String,
    },

    /// A cache entry exists but cannot be trusted.
    #[error("Corrupt cache entry {digest}: {reason}")]
    CorruptCache {
        /// Digest of the damaged entry
        digest: String,
        /// What is wrong with it
        reason: String,
    },

    /// A string that should be a sha-256 hex digest is not one.
    #[error("Invalid digest: {0:?}")]
    InvalidDigest(String),

    /// Options were rejected before any work started.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Processing was aborted through a cancel token.
    #[error("Processing cancelled")]
    Cancelled,
}

fn processing_message(page: Option<u32>, message: &str) -> String {
    match page {
        Some(page) => format!("Processing error on page {}: {}", page, message),
        None => format!("Processing error: {}", message),
    }
}

impl Error {
    /// Returns a closure that wraps an `io::Error` with the given path.
    ///
    /// ```
    /// # use takeoff::Error;
    /// let path = std::path::Path::new("missing.pdf");
    /// let err = std::fs::read(path).map_err(Error::io(path)).unwrap_err();
    /// assert!(matches!(err, Error::Io { .. }));
    /// ```
    pub fn io(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
        move |source| Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Document-level processing error.
    pub fn processing(message: impl Into<String>) -> Self {
        Error::Processing {
            page: None,
            message: message.into(),
        }
    }

    /// Page-scoped processing error.
    pub fn page(page: u32, message: impl Into<String>) -> Self {
        Error::Processing {
            page: Some(page),
            message: message.into(),
        }
    }

    /// Corrupt cache error for the given entry.
    pub fn corrupt(digest: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorruptCache {
            digest: digest.into(),
            reason: reason.into(),
        }
    }

    /// Attach a page number to a document-level processing error.
    ///
    /// Errors that already carry a page, or that are not processing errors,
    /// are returned unchanged.
    pub fn at_page(self, page: u32) -> Self {
        match self {
            Error::Processing {
                page: None,
                message,
            } => Error::Processing {
                page: Some(page),
                message,
            },
            other => other,
        }
    }

    /// Whether this is the expected "not cached yet" signal.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss { .. })
    }

    /// Whether this reports a damaged cache entry.
    pub fn is_corrupt_cache(&self) -> bool {
        matches!(self, Error::CorruptCache { .. })
    }

    /// The `io::ErrorKind` of an I/O error.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

#[cfg(feature = "pdfium")]
impl From<pdfium_render::prelude::PdfiumError> for Error {
    fn from(err: pdfium_render::prelude::PdfiumError) -> Self {
        Error::processing(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::page(3, "render failed");
        assert_eq!(err.to_string(), "Processing error on page 3: render failed");

        let err = Error::processing("no pages");
        assert_eq!(err.to_string(), "Processing error: no pages");

        let err = Error::CacheMiss {
            digest: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "No cache entry for abc");
    }

    #[test]
    fn test_io_error_keeps_path_and_kind() {
        let path = Path::new("/nonexistent/takeoff/input.pdf");
        let err = std::fs::File::open(path).map_err(Error::io(path)).unwrap_err();
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
        assert!(err.to_string().contains("input.pdf"));
    }

    #[test]
    fn test_at_page() {
        let err = Error::processing("bad stream").at_page(2);
        assert!(matches!(err, Error::Processing { page: Some(2), .. }));

        let err = Error::page(5, "bad stream").at_page(2);
        assert!(matches!(err, Error::Processing { page: Some(5), .. }));

        assert!(matches!(Error::Cancelled.at_page(1), Error::Cancelled));
    }

    #[test]
    fn test_cache_predicates() {
        assert!(Error::CacheMiss {
            digest: String::new()
        }
        .is_cache_miss());
        assert!(Error::corrupt("d", "r").is_corrupt_cache());
        assert!(!Error::corrupt("d", "r").is_cache_miss());
    }
}

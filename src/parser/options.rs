//! Extraction options and configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Default render resolution.
pub const DEFAULT_DPI: f32 = 150.0;

/// Options for extracting pages from a document.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Render resolution in dots per inch
    pub dpi: f32,

    /// Whether to extract pages on a worker pool
    pub parallel: bool,

    /// Upper bound on worker threads (0 = one per core)
    pub max_workers: usize,

    /// Abort signal checked between pages
    pub cancel: CancelToken,
}

impl ExtractOptions {
    /// Create new extract options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set render resolution.
    pub fn with_dpi(mut self, dpi: f32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Bound the number of worker threads.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Use the given cancel token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Zoom factor relative to the native 72 DPI.
    pub fn zoom_factor(&self) -> f32 {
        crate::model::Page::zoom_for_dpi(self.dpi)
    }

    /// Reject options that cannot produce a render.
    pub fn validate(&self) -> Result<()> {
        if !self.dpi.is_finite() || self.dpi <= 0.0 {
            return Err(Error::InvalidOptions(format!(
                "dpi must be a positive number, got {}",
                self.dpi
            )));
        }
        Ok(())
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            parallel: true,
            max_workers: 0,
            cancel: CancelToken::new(),
        }
    }
}

/// Shared flag used to abort extraction.
///
/// Clones observe the same flag. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

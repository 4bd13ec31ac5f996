//! Digest → cache lookup → load, or extract and store.

use std::path::Path;

use crate::cache::CacheStore;
use crate::digest::digest_file;
use crate::error::Result;
use crate::model::Document;
use crate::parser::{source_name, BackendLoader, ExtractOptions, Extractor};

/// Where a processed document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Loaded from an existing cache entry
    CacheHit,
    /// Extracted from the source document
    Extracted,
}

impl Origin {
    /// Short label for reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::CacheHit => "cache hit",
            Origin::Extracted => "extracted",
        }
    }
}

/// Result of running the pipeline on one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    /// The processed document
    pub document: Document,
    /// How it was obtained
    pub origin: Origin,
}

impl Processed {
    /// Whether the document was served from the cache.
    pub fn is_cache_hit(&self) -> bool {
        self.origin == Origin::CacheHit
    }
}

/// Processing pipeline over a [`BackendLoader`].
///
/// The document library only runs on a cache miss, a corrupt entry, or when
/// the cache read is bypassed with [`Pipeline::refresh`].
#[derive(Debug, Clone)]
pub struct Pipeline<B> {
    loader: B,
    extractor: Extractor,
    cache: Option<CacheStore>,
    refresh: bool,
}

impl<B: BackendLoader> Pipeline<B> {
    /// Pipeline without a cache; add one with [`Pipeline::with_cache`].
    pub fn new(loader: B, options: ExtractOptions) -> Self {
        Self {
            loader,
            extractor: Extractor::new(options),
            cache: None,
            refresh: false,
        }
    }

    /// Use `store` as the cache.
    pub fn with_cache(mut self, store: CacheStore) -> Self {
        self.cache = Some(store);
        self
    }

    /// Neither read nor write the cache.
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Skip the cache read; fresh results are still stored.
    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// The cache in use, if any.
    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// The extractor run on a miss.
    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    /// Process the document at `path`.
    ///
    /// A corrupt cache entry is logged and treated as a miss. Nothing is
    /// stored when extraction fails or is cancelled.
    pub fn process<P: AsRef<Path>>(&self, path: P) -> Result<Processed> {
        let path = path.as_ref();
        self.extractor.options().validate()?;

        let digest = digest_file(path)?;
        log::debug!("{} has digest {}", path.display(), digest);

        if let Some(store) = self.cache.as_ref().filter(|_| !self.refresh) {
            match store.load(&digest) {
                Ok(document) => {
                    log::info!(
                        "Cache hit for {} ({} pages)",
                        source_name(path),
                        document.page_count()
                    );
                    return Ok(Processed {
                        document,
                        origin: Origin::CacheHit,
                    });
                }
                Err(e) if e.is_cache_miss() => log::debug!("Cache miss for {}", digest),
                Err(e) if e.is_corrupt_cache() => {
                    log::warn!("Ignoring corrupt cache entry, re-extracting: {}", e)
                }
                Err(e) => return Err(e),
            }
        }

        let backend = self.loader.open(path)?;
        let document = self
            .extractor
            .extract_document(path, backend.as_ref(), digest)?;

        if let Some(store) = &self.cache {
            store.store(&document)?;
        }

        Ok(Processed {
            document,
            origin: Origin::Extracted,
        })
    }
}

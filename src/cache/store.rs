//! Content-addressable disk cache of processed documents.
//!
//! Layout under the cache root:
//!
//! ```text
//! <root>/
//!   <content-digest>/record.json    one entry per source document
//!   assets/<image-digest>.png       page images, shared by all entries
//! ```
//!
//! An entry exists exactly when its `record.json` exists. The record is
//! written last, through a temporary file and a rename, so a concurrent
//! reader sees either no entry or a complete one.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::digest::is_valid_digest;
use crate::error::{Error, Result};
use crate::model::Document;

use super::codec::{self, DocumentRecord};

/// File holding an entry's structured record.
pub const RECORD_FILE_NAME: &str = "record.json";

/// Shared directory of externalized page images.
pub const ASSET_DIR_NAME: &str = "assets";

/// Cache directory used when none is configured.
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Disk cache rooted at a directory.
///
/// The store holds no state besides its root; any number of instances may
/// point at the same directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `root`. Nothing is created on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `./.cache`, relative to the working directory.
    pub fn default_root() -> PathBuf {
        PathBuf::from(DEFAULT_CACHE_DIR)
    }

    /// Cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the entry for `digest`.
    pub fn entry_dir(&self, digest: &str) -> Result<PathBuf> {
        if !is_valid_digest(digest) {
            return Err(Error::InvalidDigest(digest.to_string()));
        }
        Ok(self.root.join(digest))
    }

    /// Path of the record for `digest`.
    pub fn record_path(&self, digest: &str) -> Result<PathBuf> {
        Ok(self.entry_dir(digest)?.join(RECORD_FILE_NAME))
    }

    /// Shared asset directory.
    pub fn asset_dir(&self) -> PathBuf {
        self.root.join(ASSET_DIR_NAME)
    }

    /// Whether an entry for `digest` exists. Never fails; a malformed digest
    /// simply has no entry.
    pub fn exists(&self, digest: &str) -> bool {
        self.record_path(digest)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Read and parse the record for `digest` without resolving assets.
    ///
    /// Whenever [`CacheStore::exists`] is false this is [`Error::CacheMiss`];
    /// a record that is there but cannot be read is [`Error::CorruptCache`].
    pub fn load_record(&self, digest: &str) -> Result<DocumentRecord> {
        if !self.exists(digest) {
            return Err(Error::CacheMiss {
                digest: digest.to_string(),
            });
        }
        let path = self.record_path(digest)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            // Removed between the check and the read
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::CacheMiss {
                    digest: digest.to_string(),
                })
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(Error::corrupt(digest, "record is not valid UTF-8"))
            }
            Err(e) => return Err(Error::corrupt(digest, format!("unreadable record: {}", e))),
        };

        let record = DocumentRecord::from_json(&json, digest)?;
        if record.content_digest != digest {
            return Err(Error::corrupt(
                digest,
                format!("record belongs to {}", record.content_digest),
            ));
        }
        Ok(record)
    }

    /// Load the document cached under `digest`.
    ///
    /// A missing entry is [`Error::CacheMiss`]; an entry that exists but
    /// cannot be decoded is [`Error::CorruptCache`].
    pub fn load(&self, digest: &str) -> Result<Document> {
        let record = self.load_record(digest)?;
        let document = codec::decode(record, &self.asset_dir())?;
        log::debug!(
            "Loaded {} from cache ({} pages)",
            document.source_name,
            document.page_count()
        );
        Ok(document)
    }

    /// Persist `doc` under its content digest, replacing any previous entry.
    pub fn store(&self, doc: &Document) -> Result<()> {
        doc.validate()?;

        let entry_dir = self.entry_dir(&doc.content_digest)?;
        let asset_dir = self.asset_dir();
        fs::create_dir_all(&entry_dir).map_err(Error::io(&entry_dir))?;
        fs::create_dir_all(&asset_dir).map_err(Error::io(&asset_dir))?;

        let record = codec::encode(doc, &asset_dir)?;
        let json = record.to_json()?;

        let record_path = entry_dir.join(RECORD_FILE_NAME);
        let mut tmp = NamedTempFile::new_in(&entry_dir).map_err(Error::io(&entry_dir))?;
        tmp.write_all(json.as_bytes()).map_err(Error::io(tmp.path()))?;
        tmp.as_file().sync_all().map_err(Error::io(tmp.path()))?;
        tmp.persist(&record_path)
            .map_err(|e| Error::io(&record_path)(e.error))?;

        log::info!(
            "Cached {} as {} ({} pages)",
            doc.source_name,
            doc.content_digest,
            doc.page_count()
        );
        Ok(())
    }

    /// Delete the entry for `digest`. Returns whether there was one.
    ///
    /// Shared assets are left in place; other entries may reference them.
    pub fn remove(&self, digest: &str) -> Result<bool> {
        let entry_dir = self.entry_dir(digest)?;
        match fs::remove_dir_all(&entry_dir) {
            Ok(()) => {
                log::debug!("Removed cache entry {}", digest);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&entry_dir)(e)),
        }
    }

    /// Digests of all complete entries, sorted.
    pub fn digests(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.root)(e)),
        };

        let mut digests = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Error::io(&self.root))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.exists(&name) {
                digests.push(name);
            }
        }
        digests.sort();
        Ok(digests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_bytes;
    use crate::model::{Page, PageImage, TextBlock};

    fn document(seed: &[u8]) -> Document {
        let page = Page {
            page_number: 1,
            width: 612.0,
            height: 792.0,
            zoom_factor: 1.0,
            raw_text: "General Notes".to_string(),
            image: PageImage::from_rgba(1, 1, vec![0, 0, 0, 255]).unwrap(),
            text_blocks: vec![TextBlock::new("General Notes", (36.0, 36.0, 180.0, 52.0))],
        };
        Document::new("notes.pdf", digest_bytes(seed), vec![page])
    }

    #[test]
    fn test_layout_paths() {
        let store = CacheStore::new("/var/cache/takeoff");
        let digest = digest_bytes(b"x");
        assert_eq!(
            store.record_path(&digest).unwrap(),
            Path::new("/var/cache/takeoff").join(&digest).join("record.json")
        );
        assert_eq!(store.asset_dir(), Path::new("/var/cache/takeoff/assets"));
        assert_eq!(CacheStore::default_root(), Path::new(".cache"));
    }

    #[test]
    fn test_invalid_digest_rejected() {
        let store = CacheStore::new("/tmp");
        assert!(matches!(store.entry_dir("../etc"), Err(Error::InvalidDigest(_))));
        assert!(store.load("ABC").unwrap_err().is_cache_miss());
        assert!(!store.exists("../etc"));
        assert!(!store.exists(ASSET_DIR_NAME));
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        let doc = document(b"notes");

        assert!(!store.exists(&doc.content_digest));
        store.store(&doc).unwrap();
        assert!(store.exists(&doc.content_digest));
        assert_eq!(store.load(&doc.content_digest).unwrap(), doc);
    }

    #[test]
    fn test_missing_entry_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let err = store.load(&digest_bytes(b"never stored")).unwrap_err();
        assert!(err.is_cache_miss());
    }

    #[test]
    fn test_garbage_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let digest = digest_bytes(b"garbage");
        fs::create_dir_all(store.entry_dir(&digest).unwrap()).unwrap();
        fs::write(store.record_path(&digest).unwrap(), b"{ not json").unwrap();

        assert!(store.exists(&digest));
        assert!(store.load(&digest).unwrap_err().is_corrupt_cache());
    }

    #[test]
    fn test_record_path_taken_by_directory_is_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let digest = digest_bytes(b"odd");
        fs::create_dir_all(store.record_path(&digest).unwrap()).unwrap();

        assert!(!store.exists(&digest));
        assert!(store.load(&digest).unwrap_err().is_cache_miss());
    }

    #[test]
    fn test_non_utf8_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let digest = digest_bytes(b"binary");
        fs::create_dir_all(store.entry_dir(&digest).unwrap()).unwrap();
        fs::write(store.record_path(&digest).unwrap(), [0xFF, 0xFE, 0x00, 0x80]).unwrap();

        let err = store.load(&digest).unwrap_err();
        assert!(err.is_corrupt_cache());
        assert!(err.io_kind().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_record_is_corrupt() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let doc = document(b"locked");
        store.store(&doc).unwrap();
        let record = store.record_path(&doc.content_digest).unwrap();
        fs::set_permissions(&record, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores file modes
        if fs::read(&record).is_ok() {
            return;
        }
        assert!(store.load(&doc.content_digest).unwrap_err().is_corrupt_cache());
    }

    #[test]
    fn test_record_under_wrong_digest_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let doc = document(b"a");
        store.store(&doc).unwrap();

        let other = digest_bytes(b"b");
        fs::create_dir_all(store.entry_dir(&other).unwrap()).unwrap();
        fs::copy(
            store.record_path(&doc.content_digest).unwrap(),
            store.record_path(&other).unwrap(),
        )
        .unwrap();

        assert!(store.load(&other).unwrap_err().is_corrupt_cache());
    }

    #[test]
    fn test_store_replaces_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let mut doc = document(b"rev");
        store.store(&doc).unwrap();

        doc.pages[0].raw_text = "General Notes (rev B)".to_string();
        store.store(&doc).unwrap();
        assert_eq!(store.load(&doc.content_digest).unwrap(), doc);

        // Only the record remains in the entry directory
        let files = fs::read_dir(store.entry_dir(&doc.content_digest).unwrap())
            .unwrap()
            .count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_store_rejects_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let mut doc = document(b"x");
        doc.pages.clear();

        assert!(store.store(&doc).is_err());
        assert!(!store.exists(&doc.content_digest));
    }

    #[test]
    fn test_store_rejects_image_that_would_not_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let mut raw = document(b"raw");
        raw.pages[0].image = PageImage::new(1, 1, vec![1, 2, 3]);
        assert!(store.store(&raw).is_err());
        assert!(!store.exists(&raw.content_digest));

        let mut resized = document(b"resized");
        let png = resized.pages[0].image.data.clone();
        resized.pages[0].image = PageImage::new(10, 20, png);
        assert!(store.store(&resized).is_err());
        assert!(!store.exists(&resized.content_digest));
        assert!(!store.asset_dir().exists());
    }

    #[test]
    fn test_store_rejects_non_finite_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let mut doc = document(b"nan");
        doc.pages[0].text_blocks[0].bbox.x0 = f32::NAN;

        assert!(matches!(store.store(&doc), Err(Error::Processing { .. })));
        assert!(!store.exists(&doc.content_digest));
    }

    #[test]
    fn test_remove_keeps_shared_assets() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let a = document(b"a");
        let b = document(b"b");
        store.store(&a).unwrap();
        store.store(&b).unwrap();

        assert!(store.remove(&a.content_digest).unwrap());
        assert!(!store.remove(&a.content_digest).unwrap());
        assert!(!store.exists(&a.content_digest));
        assert_eq!(store.load(&b.content_digest).unwrap(), b);
    }

    #[test]
    fn test_digests_lists_complete_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        assert!(store.digests().unwrap().is_empty());

        let a = document(b"a");
        let b = document(b"b");
        store.store(&a).unwrap();
        store.store(&b).unwrap();
        // Directory without a record is not an entry
        fs::create_dir_all(store.entry_dir(&digest_bytes(b"partial")).unwrap()).unwrap();

        let mut expected = vec![a.content_digest, b.content_digest];
        expected.sort();
        assert_eq!(store.digests().unwrap(), expected);
    }
}

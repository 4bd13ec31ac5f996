//! Asset codec: in-memory documents to structured records and back.
//!
//! All text and numeric fields are inlined into a [`DocumentRecord`]. Page
//! images are written to content-named files in an asset directory and the
//! record keeps only the file name. Decoding resolves those names again and
//! verifies every asset against its name.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::digest::{digest_bytes, is_valid_digest};
use crate::error::{Error, Result};
use crate::model::{Document, Page, PageImage, TextBlock};

/// Version of the record layout. Records with another version are stale.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// Extension of externalized page images.
pub const ASSET_EXTENSION: &str = "png";

/// Structured record of a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Record layout version
    pub schema_version: u32,
    /// When the record was encoded
    pub created_at: DateTime<Utc>,
    /// Crate name and version that wrote the record
    pub generator: String,
    /// File name of the source document
    pub source_name: String,
    /// sha-256 hex digest of the source bytes
    pub content_digest: String,
    /// Page records in order
    pub pages: Vec<PageRecord>,
}

/// Structured record of a [`Page`]; the image is a file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub page_number: u32,
    pub width: f32,
    pub height: f32,
    pub zoom_factor: f32,
    pub raw_text: String,
    /// `<image-digest>.png`, relative to the asset directory
    pub image: String,
    pub text_blocks: Vec<TextBlock>,
}

impl DocumentRecord {
    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::processing(format!("record serialization failed: {}", e))
        })
    }

    /// Parse a record, reporting failures as corruption of `digest`.
    pub fn from_json(json: &str, digest: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::corrupt(digest, format!("malformed record: {}", e)))
    }
}

/// Build the record for `doc` without touching the disk.
///
/// Page images are referenced by their content name. The document is
/// validated first, so a record that would not decode again is never built.
pub fn record_for(doc: &Document) -> Result<DocumentRecord> {
    doc.validate()?;

    let pages = doc
        .pages
        .iter()
        .map(|page| PageRecord {
            page_number: page.page_number,
            width: page.width,
            height: page.height,
            zoom_factor: page.zoom_factor,
            raw_text: page.raw_text.clone(),
            image: page.image.file_name(),
            text_blocks: page.text_blocks.clone(),
        })
        .collect();

    Ok(DocumentRecord {
        schema_version: RECORD_SCHEMA_VERSION,
        created_at: Utc::now(),
        generator: concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string(),
        source_name: doc.source_name.clone(),
        content_digest: doc.content_digest.clone(),
        pages,
    })
}

/// Encode a document, externalizing its images into `asset_dir`.
///
/// Images already present under their content name are not rewritten.
/// Nothing is written when the document fails validation.
pub fn encode(doc: &Document, asset_dir: &Path) -> Result<DocumentRecord> {
    let record = record_for(doc)?;
    for page in &doc.pages {
        write_asset(asset_dir, &page.image)?;
    }
    Ok(record)
}

/// Decode a record, reading its images back from `asset_dir`.
pub fn decode(record: DocumentRecord, asset_dir: &Path) -> Result<Document> {
    let digest = record.content_digest.clone();
    validate_record(&record)?;

    let pages = record
        .pages
        .into_iter()
        .map(|page| {
            let image = read_asset(asset_dir, &page.image, &digest)?;
            Ok(Page {
                page_number: page.page_number,
                width: page.width,
                height: page.height,
                zoom_factor: page.zoom_factor,
                raw_text: page.raw_text,
                image,
                text_blocks: page.text_blocks,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Document::new(record.source_name, digest, pages))
}

/// Write an image under its content name unless it is already there.
///
/// Returns the file name. The bytes go to a temporary file first and are
/// published with a no-clobber rename, so a reader never sees a partial
/// asset.
pub fn write_asset(asset_dir: &Path, image: &PageImage) -> Result<String> {
    let name = image.file_name();
    let target = asset_dir.join(&name);

    if target.exists() {
        log::debug!("Asset {} already present", name);
        return Ok(name);
    }

    let mut tmp = NamedTempFile::new_in(asset_dir).map_err(Error::io(asset_dir))?;
    tmp.write_all(&image.data).map_err(Error::io(tmp.path()))?;

    match tmp.persist_noclobber(&target) {
        Ok(_) => {
            log::debug!("Wrote asset {} ({} bytes)", name, image.size());
            Ok(name)
        }
        // Another writer published the same content first
        Err(_) if target.exists() => Ok(name),
        Err(e) => Err(Error::io(&target)(e.error)),
    }
}

fn read_asset(asset_dir: &Path, name: &str, digest: &str) -> Result<PageImage> {
    let expected = asset_digest(name)
        .ok_or_else(|| Error::corrupt(digest, format!("invalid asset name {:?}", name)))?;

    let path = asset_dir.join(name);
    let data = fs::read(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::corrupt(digest, format!("missing asset {}", name)),
        _ => Error::corrupt(digest, format!("unreadable asset {}: {}", name, e)),
    })?;

    if digest_bytes(&data) != expected {
        return Err(Error::corrupt(
            digest,
            format!("asset {} does not match its digest", name),
        ));
    }

    PageImage::from_png(data)
        .map_err(|e| Error::corrupt(digest, format!("asset {}: {}", name, e)))
}

/// Digest part of `<digest>.png`, if the name has that shape.
fn asset_digest(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(ASSET_EXTENSION)?.strip_suffix('.')?;
    is_valid_digest(stem).then_some(stem)
}

fn validate_record(record: &DocumentRecord) -> Result<()> {
    let digest = &record.content_digest;

    if record.schema_version != RECORD_SCHEMA_VERSION {
        return Err(Error::corrupt(
            digest.as_str(),
            format!(
                "stale record schema {} (expected {})",
                record.schema_version, RECORD_SCHEMA_VERSION
            ),
        ));
    }
    if !is_valid_digest(digest) {
        return Err(Error::corrupt(digest.as_str(), "record digest is not a sha-256 hex string"));
    }
    if record.pages.is_empty() {
        return Err(Error::corrupt(digest.as_str(), "record has no pages"));
    }
    for (index, page) in record.pages.iter().enumerate() {
        if page.page_number != index as u32 + 1 {
            return Err(Error::corrupt(
                digest.as_str(),
                format!(
                    "page at position {} is numbered {}",
                    index + 1,
                    page.page_number
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;

    fn sample_document() -> Document {
        let pages = (1..=2)
            .map(|n| Page {
                page_number: n,
                width: 612.0,
                height: 792.0,
                zoom_factor: 150.0 / 72.0,
                raw_text: format!("Sheet A-{}\n", n),
                image: PageImage::from_rgba(2, 2, vec![n as u8; 16]).unwrap(),
                text_blocks: vec![
                    TextBlock::new(format!("Sheet A-{}", n), (10.0, 10.0, 100.0, 30.0)),
                    TextBlock::new("Scale 1/4\" = 1'-0\"", (10.0, 35.0, 100.0, 50.0)),
                ],
            })
            .collect();
        Document::new("plan.pdf", digest_bytes(b"plan"), pages)
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let doc = sample_document();

        let record = encode(&doc, dir.path()).unwrap();
        assert_eq!(record.schema_version, RECORD_SCHEMA_VERSION);
        assert_eq!(record.pages[0].image, doc.pages[0].image.file_name());

        let json = record.to_json().unwrap();
        let parsed = DocumentRecord::from_json(&json, &doc.content_digest).unwrap();
        assert_eq!(parsed, record);

        let decoded = decode(parsed, dir.path()).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn test_record_is_human_readable() {
        let dir = tempfile::tempdir().unwrap();
        let json = encode(&sample_document(), dir.path())
            .unwrap()
            .to_json()
            .unwrap();
        assert!(json.contains("\"source_name\": \"plan.pdf\""));
        assert!(json.contains("\"text\": \"Sheet A-1\""));
        assert!(json.contains(".png\""));
        // No inline image payload
        assert!(json.len() < 4096);
    }

    #[test]
    fn test_identical_images_share_one_asset() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample_document();
        doc.pages[1].image = doc.pages[0].image.clone();

        let record = encode(&doc, dir.path()).unwrap();
        assert_eq!(record.pages[0].image, record.pages[1].image);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_existing_asset_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let image = PageImage::from_rgba(1, 1, vec![7, 7, 7, 255]).unwrap();
        let name = write_asset(dir.path(), &image).unwrap();
        let before = fs::metadata(dir.path().join(&name)).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(write_asset(dir.path(), &image).unwrap(), name);
        let after = fs::metadata(dir.path().join(&name)).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_asset_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let doc = sample_document();
        let record = encode(&doc, dir.path()).unwrap();
        fs::remove_file(dir.path().join(&record.pages[1].image)).unwrap();

        let err = decode(record, dir.path()).unwrap_err();
        assert!(err.is_corrupt_cache());
        assert!(err.to_string().contains("missing asset"));
    }

    #[test]
    fn test_tampered_asset_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let record = encode(&sample_document(), dir.path()).unwrap();
        fs::write(dir.path().join(&record.pages[0].image), b"tampered").unwrap();

        let err = decode(record, dir.path()).unwrap_err();
        assert!(err.is_corrupt_cache());
    }

    #[test]
    fn test_asset_name_cannot_escape_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = encode(&sample_document(), dir.path()).unwrap();
        record.pages[0].image = "../record.json".to_string();

        let err = decode(record, dir.path()).unwrap_err();
        assert!(err.is_corrupt_cache());
        assert!(err.to_string().contains("invalid asset name"));
    }

    #[test]
    fn test_stale_schema_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = encode(&sample_document(), dir.path()).unwrap();
        record.schema_version = RECORD_SCHEMA_VERSION + 1;
        assert!(decode(record, dir.path()).unwrap_err().is_corrupt_cache());
    }

    #[test]
    fn test_page_numbering_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = encode(&sample_document(), dir.path()).unwrap();
        record.pages.swap(0, 1);
        assert!(decode(record.clone(), dir.path()).unwrap_err().is_corrupt_cache());

        record.pages.clear();
        assert!(decode(record, dir.path()).unwrap_err().is_corrupt_cache());
    }

    #[test]
    fn test_malformed_json_is_corrupt() {
        let err = DocumentRecord::from_json("{\"schema_version\": 1", "abc").unwrap_err();
        assert!(matches!(err, Error::CorruptCache { ref digest, .. } if digest == "abc"));
    }

    #[test]
    fn test_text_block_order_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample_document();
        doc.pages[0].text_blocks = (0..50)
            .rev()
            .map(|i| TextBlock::new(format!("n{}", i), BoundingBox::new(i as f32, 0.0, 1.0, 1.0)))
            .collect();

        let record = encode(&doc, dir.path()).unwrap();
        let decoded = decode(record, dir.path()).unwrap();
        assert_eq!(decoded.pages[0].text_blocks, doc.pages[0].text_blocks);
    }

    #[test]
    fn test_record_for_writes_nothing() {
        let doc = sample_document();
        let record = record_for(&doc).unwrap();
        assert_eq!(record.pages.len(), 2);
        assert_eq!(record.pages[1].image, doc.pages[1].image.file_name());
        assert!(record.generator.starts_with("takeoff "));
    }

    #[test]
    fn test_encode_rejects_image_not_matching_its_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample_document();
        let png = doc.pages[0].image.data.clone();
        doc.pages[0].image = PageImage::new(10, 20, png);

        assert!(matches!(
            encode(&doc, dir.path()),
            Err(Error::Processing { page: Some(1), .. })
        ));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_encode_rejects_raw_image_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample_document();
        doc.pages[1].image = PageImage::new(1, 1, vec![1, 2, 3]);

        assert!(encode(&doc, dir.path()).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_encode_rejects_non_finite_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = sample_document();
        doc.pages[0].text_blocks[0].bbox.x0 = f32::NAN;

        assert!(encode(&doc, dir.path()).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_asset_digest() {
        let d = digest_bytes(b"x");
        assert_eq!(asset_digest(&format!("{}.png", d)), Some(d.as_str()));
        assert_eq!(asset_digest(&format!("{}.jpg", d)), None);
        assert_eq!(asset_digest("short.png"), None);
    }
}

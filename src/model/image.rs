//! Rendered page images.

use std::fmt;
use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbaImage};

use crate::digest::digest_bytes;
use crate::error::{Error, Result};

/// PNG signature: 89 50 4E 47 0D 0A 1A 0A
const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// A rendered page raster, held as PNG-encoded RGBA.
///
/// The image is identified by the digest of its own encoded bytes, so two
/// byte-identical renders share one file once persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// PNG-encoded bytes
    pub data: Vec<u8>,
}

impl PageImage {
    /// Wrap already-encoded PNG bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Encode a raw RGBA buffer as PNG.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let img = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            Error::processing(format!(
                "RGBA buffer does not match {}x{} raster",
                width, height
            ))
        })?;

        let mut data = Vec::new();
        img.write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .map_err(|e| Error::processing(format!("PNG encoding failed: {}", e)))?;

        Ok(Self::new(width, height, data))
    }

    /// Read dimensions from PNG bytes and wrap them.
    pub fn from_png(data: Vec<u8>) -> Result<Self> {
        let (width, height) = png_dimensions(&data)?;
        Ok(Self::new(width, height, data))
    }

    /// Check that the bytes are a PNG whose header agrees with
    /// `width` and `height`.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = png_dimensions(&self.data)?;
        if (width, height) != (self.width, self.height) {
            return Err(Error::processing(format!(
                "image is {}x{} but its PNG header says {}x{}",
                self.width, self.height, width, height
            )));
        }
        Ok(())
    }

    /// Check PNG magic bytes.
    pub fn is_png(data: &[u8]) -> bool {
        data.starts_with(&PNG_MAGIC)
    }

    /// sha-256 hex digest of the encoded bytes.
    pub fn digest(&self) -> String {
        digest_bytes(&self.data)
    }

    /// Content-addressed file name, `<digest>.png`.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.digest())
    }

    /// Size of the encoded image in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

fn png_dimensions(data: &[u8]) -> Result<(u32, u32)> {
    if !PageImage::is_png(data) {
        return Err(Error::processing("image data is not a PNG"));
    }
    ImageReader::with_format(Cursor::new(data), ImageFormat::Png)
        .into_dimensions()
        .map_err(|e| Error::processing(format!("unreadable PNG header: {}", e)))
}

impl fmt::Debug for PageImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size", &self.data.len())
            .finish()
    }
}

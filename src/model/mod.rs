//! Document model types for extracted page content.
//!
//! A [`Document`] is produced either by the page extractor on a fresh run or
//! by the cache store on a cache hit. Both paths yield identical values for
//! the same input bytes.

mod document;
mod image;
mod page;

pub use document::Document;
pub use image::PageImage;
pub use page::{BoundingBox, Page, TextBlock};

//! Disk cache of processed documents.

pub mod codec;
mod store;

pub use codec::{decode, encode, record_for, DocumentRecord, PageRecord, RECORD_SCHEMA_VERSION};
pub use store::{CacheStore, ASSET_DIR_NAME, DEFAULT_CACHE_DIR, RECORD_FILE_NAME};

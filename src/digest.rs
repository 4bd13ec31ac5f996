//! Content digests used as cache keys.
//!
//! Digests are lowercase hex SHA-256 of the raw bytes. Files are hashed in
//! fixed-size chunks and never loaded whole.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Chunk size used when hashing files.
pub const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

/// Length of a hex-encoded sha-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the sha-256 digest of a file.
///
/// # Example
///
/// ```no_run
/// use takeoff::digest::digest_file;
///
/// let digest = digest_file("plan.pdf").unwrap();
/// assert_eq!(digest.len(), 64);
/// ```
pub fn digest_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let file = File::open(path).map_err(Error::io(path))?;
    digest_reader(file).map_err(|e| match e {
        Error::Io { source, .. } => Error::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Compute the sha-256 digest of everything a reader yields.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::io(Path::new("<reader>"))(e)),
        };
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the sha-256 digest of an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Check that a string is a lowercase hex sha-256 digest.
pub fn is_valid_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

//! Encrypted blob store — content storage for uploaded documents.
//!
//! The store holds opaque encrypted bytes keyed by blob key; it never sees
//! plaintext. Decryption happens in the pipeline via [`crate::crypto`].

use std::io::ErrorKind;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage contract for encrypted document bytes.
///
/// Implementations must store bytes verbatim; an S3-class object store
/// satisfies this contract in production.
pub trait BlobStore: Send + Sync {
    /// Fetch the encrypted bytes for a key.
    fn get(&self, blob_key: &str) -> Result<Vec<u8>, BlobError>;

    /// Store encrypted bytes under a key. Used by ingress.
    fn put(&self, blob_key: &str, bytes: &[u8]) -> Result<(), BlobError>;
}

/// Content address for a blob: SHA-256 of the encrypted bytes, hex-encoded.
pub fn content_address(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Filesystem-backed blob store: one file per key under a root directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, blob_key: &str) -> Result<PathBuf, BlobError> {
        // Keys are opaque identifiers, not paths.
        if blob_key.is_empty()
            || blob_key.contains(['/', '\\'])
            || blob_key.starts_with('.')
        {
            return Err(BlobError::InvalidKey(blob_key.to_string()));
        }
        Ok(self.root.join(blob_key))
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, blob_key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(blob_key)?;
        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => BlobError::NotFound(blob_key.to_string()),
            _ => BlobError::Io(e),
        })
    }

    fn put(&self, blob_key: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.path_for(blob_key)?;
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(&path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("blob-1", b"encrypted bytes").unwrap();
        assert_eq!(store.get("blob-1").unwrap(), b"encrypted bytes");
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(matches!(store.get("absent"), Err(BlobError::NotFound(_))));
    }

    #[test]
    fn path_traversal_keys_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(matches!(store.get("../etc/passwd"), Err(BlobError::InvalidKey(_))));
        assert!(matches!(store.put("a/b", b"x"), Err(BlobError::InvalidKey(_))));
        assert!(matches!(store.get(""), Err(BlobError::InvalidKey(_))));
    }

    #[test]
    fn content_address_is_stable_sha256() {
        let a = content_address(b"same bytes");
        let b = content_address(b"same bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_address(b"other bytes"));
    }
}

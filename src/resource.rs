//! Resource metadata resolution and fingerprinting.
//!
//! The fingerprint is a SHA-256 digest of the full file contents, rendered
//! as lowercase hex. Digests are memoized per path in an explicit
//! [`FingerprintCache`] owned by the server state; nothing invalidates an
//! entry, so a file modified behind a running process serves a stale
//! fingerprint until restart. Accepted limitation, not silently corrected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Everything the delivery engine needs to know about a resource before
/// touching its bytes.
#[derive(Debug, Clone)]
pub struct ResourceMeta {
    pub size_bytes: u64,
    pub content_type: String,
    pub last_modified: SystemTime,
    pub fingerprint: String,
}

/// Process-wide memo of content fingerprints, keyed by path.
///
/// Read-mostly: every request after the first per path takes only the read
/// lock.
#[derive(Debug, Default)]
pub struct FingerprintCache {
    inner: RwLock<HashMap<PathBuf, String>>,
}

impl FingerprintCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint of the file at `path`, computing and memoizing it on
    /// first use.
    pub async fn fingerprint(&self, path: &Path) -> Result<String> {
        if let Some(hit) = self.inner.read().expect("fingerprint lock poisoned").get(path) {
            return Ok(hit.clone());
        }

        let contents = tokio::fs::read(path).await.map_err(|e| not_found_or_io(path, e))?;
        let digest = hex::encode(Sha256::digest(&contents));

        tracing::debug!(path = %path.display(), fingerprint = %digest, "computed resource fingerprint");
        self.inner
            .write()
            .expect("fingerprint lock poisoned")
            .insert(path.to_path_buf(), digest.clone());

        Ok(digest)
    }
}

/// Resolve size, content type, last-modified time, and fingerprint for the
/// resource at `path`.
pub async fn resolve(path: &Path, fingerprints: &FingerprintCache) -> Result<ResourceMeta> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| not_found_or_io(path, e))?;
    if !metadata.is_file() {
        return Err(Error::NotFound(path.display().to_string()));
    }

    let last_modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let content_type = mime_guess::from_path(path).first_or_octet_stream().to_string();
    let fingerprint = fingerprints.fingerprint(path).await?;

    Ok(ResourceMeta {
        size_bytes: metadata.len(),
        content_type,
        last_modified,
        fingerprint,
    })
}

fn not_found_or_io(path: &Path, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound(path.display().to_string())
    } else {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    fn fixture(contents: &[u8], suffix: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn fingerprint_is_deterministic() {
        let cache = FingerprintCache::new();
        let a = fixture(b"hello range requests", ".bin");
        let b = fixture(b"hello range requests", ".bin");

        let fp_a = cache.fingerprint(a.path()).await.unwrap();
        let fp_b = cache.fingerprint(b.path()).await.unwrap();
        assert_eq!(fp_a, fp_b);
        assert_eq!(fp_a.len(), 64);
        assert!(fp_a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn fingerprint_is_memoized_per_path() {
        let cache = FingerprintCache::new();
        let file = fixture(b"original", ".bin");
        let first = cache.fingerprint(file.path()).await.unwrap();

        // Rewrite the file in place: the memo is intentionally not
        // invalidated.
        std::fs::write(file.path(), b"changed").unwrap();
        let second = cache.fingerprint(file.path()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn resolve_reports_size_and_content_type() {
        let cache = FingerprintCache::new();
        let file = fixture(b"0123456789", ".png");

        let meta = resolve(file.path(), &cache).await.unwrap();
        assert_eq!(meta.size_bytes, 10);
        assert_eq!(meta.content_type, "image/png");
        assert!(!meta.fingerprint.is_empty());
    }

    #[tokio::test]
    async fn resolve_missing_file_is_not_found() {
        let cache = FingerprintCache::new();
        let result = resolve(Path::new("does/not/exist.jpg"), &cache).await;
        assert_matches!(result, Err(Error::NotFound(_)));
    }
}

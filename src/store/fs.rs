//! Filesystem-backed content store for local, single-process hosts.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::content::{
    validate_ref, AccessMode, ContentResult, ContentStore, ContentStoreError, SignedUrl,
};

/// Stores objects as plain files under a root directory, keyed by their
/// content ref. Writes go through a temp file and rename so a crashed
/// write never leaves a half-written object behind.
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, content_ref: &str) -> ContentResult<PathBuf> {
        validate_ref(content_ref)?;
        Ok(self.root.join(content_ref))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn exists(&self, content_ref: &str) -> ContentResult<bool> {
        Ok(self.object_path(content_ref)?.is_file())
    }

    async fn len(&self, content_ref: &str) -> ContentResult<Option<u64>> {
        let path = self.object_path(content_ref)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, content_ref: &str) -> ContentResult<Vec<u8>> {
        let path = self.object_path(content_ref)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ContentStoreError::NotFound(content_ref.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(
        &self,
        content_ref: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> ContentResult<()> {
        let path = self.object_path(content_ref)?;
        let parent = path.parent().unwrap_or(Path::new(&self.root)).to_path_buf();
        std::fs::create_dir_all(&parent)?;

        // Temp file in the same directory so the rename stays on one
        // filesystem.
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    async fn signed_url(
        &self,
        content_ref: &str,
        mode: AccessMode,
        ttl: Duration,
    ) -> ContentResult<SignedUrl> {
        let path = self.object_path(content_ref)?;
        if mode == AccessMode::Read && !path.is_file() {
            return Err(ContentStoreError::NotFound(content_ref.to_string()));
        }
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        Ok(SignedUrl {
            url: format!(
                "file://{}?expires={}",
                path.display(),
                expires_at.timestamp()
            ),
            mode,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        store
            .write("uploads/2024/03/01/clip.bin", b"payload", "application/octet-stream")
            .await
            .unwrap();

        assert!(store.exists("uploads/2024/03/01/clip.bin").await.unwrap());
        assert_eq!(
            store.len("uploads/2024/03/01/clip.bin").await.unwrap(),
            Some(7)
        );
        assert_eq!(
            store.read("uploads/2024/03/01/clip.bin").await.unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        assert!(!store.exists("nope.bin").await.unwrap());
        assert_eq!(store.len("nope.bin").await.unwrap(), None);
        assert!(matches!(
            store.read("nope.bin").await,
            Err(ContentStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        store.write("a/b.txt", b"one", "text/plain").await.unwrap();
        store.write("a/b.txt", b"two", "text/plain").await.unwrap();
        assert_eq!(store.read("a/b.txt").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_traversal_ref_rejected() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());

        let err = store.read("../outside").await.unwrap_err();
        assert!(matches!(err, ContentStoreError::InvalidRef(_)));
        let err = store
            .write("/abs/path", b"x", "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, ContentStoreError::InvalidRef(_)));
    }

    #[tokio::test]
    async fn test_signed_url_carries_expiry() {
        let dir = tempdir().unwrap();
        let store = FsContentStore::new(dir.path());
        store.write("a.txt", b"x", "text/plain").await.unwrap();

        let url = store
            .signed_url("a.txt", AccessMode::Read, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.url.starts_with("file://"));
        assert!(url.expires_at > Utc::now());

        // Write URLs may target objects that are not there yet.
        let url = store
            .signed_url("pending.bin", AccessMode::Write, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url.mode, AccessMode::Write);

        // Read URLs may not.
        assert!(store
            .signed_url("pending.bin", AccessMode::Read, Duration::from_secs(60))
            .await
            .is_err());
    }
}

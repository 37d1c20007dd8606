//! In-memory content store for tests and ephemeral hosts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::content::{
    validate_ref, AccessMode, ContentResult, ContentStore, ContentStoreError, SignedUrl,
};

#[derive(Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Map-backed store. The write counter is exposed so tests can assert
/// that no-op paths really do not touch storage.
#[derive(Default)]
pub struct MemoryContentStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    writes: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Content type recorded for an object, if present.
    pub async fn content_type_of(&self, content_ref: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(content_ref)
            .map(|o| o.content_type.clone())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn exists(&self, content_ref: &str) -> ContentResult<bool> {
        validate_ref(content_ref)?;
        Ok(self.objects.read().await.contains_key(content_ref))
    }

    async fn len(&self, content_ref: &str) -> ContentResult<Option<u64>> {
        validate_ref(content_ref)?;
        Ok(self
            .objects
            .read()
            .await
            .get(content_ref)
            .map(|o| o.bytes.len() as u64))
    }

    async fn read(&self, content_ref: &str) -> ContentResult<Vec<u8>> {
        validate_ref(content_ref)?;
        self.objects
            .read()
            .await
            .get(content_ref)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| ContentStoreError::NotFound(content_ref.to_string()))
    }

    async fn write(
        &self,
        content_ref: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> ContentResult<()> {
        validate_ref(content_ref)?;
        self.objects.write().await.insert(
            content_ref.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn signed_url(
        &self,
        content_ref: &str,
        mode: AccessMode,
        ttl: Duration,
    ) -> ContentResult<SignedUrl> {
        validate_ref(content_ref)?;
        if mode == AccessMode::Read && !self.objects.read().await.contains_key(content_ref) {
            return Err(ContentStoreError::NotFound(content_ref.to_string()));
        }
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        Ok(SignedUrl {
            url: format!("memory://{}?expires={}", content_ref, expires_at.timestamp()),
            mode,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_write_count() {
        let store = MemoryContentStore::new();
        assert_eq!(store.write_count(), 0);

        store.write("a/b.json", b"[]", "application/json").await.unwrap();
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.read("a/b.json").await.unwrap(), b"[]");
        assert_eq!(store.len("a/b.json").await.unwrap(), Some(2));
        assert_eq!(
            store.content_type_of("a/b.json").await.as_deref(),
            Some("application/json")
        );
        assert_eq!(store.content_type_of("missing").await, None);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = MemoryContentStore::new();
        assert!(matches!(
            store.read("missing").await,
            Err(ContentStoreError::NotFound(_))
        ));
    }
}

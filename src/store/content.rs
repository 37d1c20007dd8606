//! Content store trait: opaque key to bytes, with signed URLs.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Access mode granted by a signed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// A URL granting time-limited access to one stored object.
#[derive(Debug, Clone)]
pub struct SignedUrl {
    pub url: String,
    pub mode: AccessMode,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentStoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid content reference: {0}")]
    InvalidRef(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ContentResult<T> = Result<T, ContentStoreError>;

/// Key-addressed blob storage. Manifest and media payloads cross this
/// boundary as opaque bytes.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn exists(&self, content_ref: &str) -> ContentResult<bool>;

    /// Stored size in bytes, or None when the object does not exist.
    async fn len(&self, content_ref: &str) -> ContentResult<Option<u64>>;

    async fn read(&self, content_ref: &str) -> ContentResult<Vec<u8>>;

    async fn write(&self, content_ref: &str, bytes: &[u8], content_type: &str)
        -> ContentResult<()>;

    /// Time-limited URL for direct client access to one object. Write
    /// URLs may point at objects that do not exist yet.
    async fn signed_url(
        &self,
        content_ref: &str,
        mode: AccessMode,
        ttl: Duration,
    ) -> ContentResult<SignedUrl>;
}

/// Content refs are store keys, not paths: relative, no traversal, no
/// empty segments.
pub(crate) fn validate_ref(content_ref: &str) -> ContentResult<()> {
    if content_ref.is_empty() || content_ref.starts_with('/') || content_ref.ends_with('/') {
        return Err(ContentStoreError::InvalidRef(content_ref.to_string()));
    }
    for segment in content_ref.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return Err(ContentStoreError::InvalidRef(content_ref.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ref() {
        assert!(validate_ref("uploads/2024/03/01/a.png").is_ok());
        assert!(validate_ref("manifests/abc.json").is_ok());
        assert!(validate_ref("").is_err());
        assert!(validate_ref("/etc/passwd").is_err());
        assert!(validate_ref("uploads/../secrets").is_err());
        assert!(validate_ref("uploads//double").is_err());
        assert!(validate_ref("uploads\\win").is_err());
        assert!(validate_ref("trailing/").is_err());
    }
}

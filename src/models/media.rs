//! Media asset model and content-store key helpers.
//!
//! Assets are identified by content-store reference; the original bytes
//! never pass through the relational layer. `requires_thumbnail` is the
//! pending-work flag for the thumbnail pipeline and the sole source of
//! truth for whether a thumbnail job has succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// An uploaded media file registered with the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    /// Content-store reference of the original upload.
    pub content_ref: String,
    /// Content-store reference of the generated thumbnail, once stored.
    pub thumbnail_ref: Option<String>,
    /// Original file name as supplied by the uploader.
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// SHA-256 of the content, hex-encoded.
    pub content_hash: String,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    /// Cleared only after a thumbnail is durably stored.
    pub requires_thumbnail: bool,
}

impl MediaAsset {
    /// Compute SHA-256 hash of content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Only raster images get thumbnails.
    pub fn wants_thumbnail(content_type: &str) -> bool {
        content_type.starts_with("image/")
    }

    /// Deterministic content-store key for an asset's thumbnail.
    pub fn thumbnail_key(id: Uuid) -> String {
        format!("thumbnails/{}.png", id.simple())
    }
}

/// Deterministic content-store key for a batch's persisted manifest.
pub fn manifest_key(batch_id: Uuid) -> String {
    format!("manifests/{}.json", batch_id.simple())
}

/// Strip path separators and shell-hostile characters from an uploaded
/// file name, keeping `.`, `-` and `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Content-store key for a fresh upload: date-partitioned, owner-scoped,
/// random prefix so repeated uploads of one file never collide.
pub fn upload_key(uploaded_by: Uuid, file_name: &str, now: DateTime<Utc>) -> String {
    format!(
        "uploads/{}/{}/{}-{}",
        now.format("%Y/%m/%d"),
        uploaded_by.simple(),
        Uuid::new_v4().simple(),
        sanitize_file_name(file_name)
    )
}

//! Media upload registration and the thumbnail pipeline.
//!
//! Clients upload straight to the content store against a signed URL,
//! then register the object here. Registration verifies the object is
//! really there before any database row exists, so every asset row
//! points at real bytes.
//!
//! Thumbnailing is driven entirely by `requires_thumbnail`: the flag is
//! set at registration for raster images and cleared only after a
//! thumbnail is durably stored. A run that fails anywhere leaves the
//! flag set, which makes re-running the job the whole retry story.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::jobs::{Job, JobHandler, JobKind, JobQueue, QueueError};
use crate::models::{upload_key, MediaAsset};
use crate::store::{
    AccessMode, ContentStore, ContentStoreError, MediaAssetRepository, SignedUrl, StoreError,
};

/// Longest edge of a generated thumbnail, in pixels.
const THUMBNAIL_MAX_DIM: u32 = 256;

/// Everything a client needs to upload one object: the reserved key and
/// a write-mode URL for it.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub content_ref: String,
    pub upload_url: SignedUrl,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media asset not found")]
    NotFound,
    #[error("uploaded object not found: {0}")]
    UploadMissing(String),
    #[error("uploaded object size mismatch: declared {declared}, stored {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("content store error: {0}")]
    Content(#[from] ContentStoreError),
}

pub struct MediaService {
    assets: Arc<dyn MediaAssetRepository>,
    content: Arc<dyn ContentStore>,
    queue: Arc<JobQueue>,
    upload_url_ttl: Duration,
    read_url_ttl: Duration,
}

impl MediaService {
    pub fn new(
        assets: Arc<dyn MediaAssetRepository>,
        content: Arc<dyn ContentStore>,
        queue: Arc<JobQueue>,
        upload_url_ttl: Duration,
        read_url_ttl: Duration,
    ) -> Self {
        Self {
            assets,
            content,
            queue,
            upload_url_ttl,
            read_url_ttl,
        }
    }

    /// Reserve a content-store key for a new upload and sign a write
    /// URL for it. Nothing is recorded yet; unregistered uploads are
    /// just orphan objects.
    pub async fn create_upload_ticket(
        &self,
        file_name: &str,
        uploaded_by: Uuid,
    ) -> Result<UploadTicket, MediaError> {
        let content_ref = upload_key(uploaded_by, file_name, Utc::now());
        let upload_url = self
            .content
            .signed_url(&content_ref, AccessMode::Write, self.upload_url_ttl)
            .await?;
        Ok(UploadTicket {
            content_ref,
            upload_url,
        })
    }

    /// Register an uploaded object as a media asset. The object must
    /// exist and its stored size must match what the client declared;
    /// image assets are flagged for thumbnailing and a job is queued.
    pub async fn register(
        &self,
        content_ref: &str,
        file_name: &str,
        content_type: &str,
        size_bytes: u64,
        content_hash: &str,
        uploaded_by: Uuid,
    ) -> Result<MediaAsset, MediaError> {
        let Some(actual) = self.content.len(content_ref).await? else {
            return Err(MediaError::UploadMissing(content_ref.to_string()));
        };
        if actual != size_bytes {
            return Err(MediaError::SizeMismatch {
                declared: size_bytes,
                actual,
            });
        }

        let content_type = if content_type.trim().is_empty() {
            "application/octet-stream"
        } else {
            content_type
        };
        let asset = MediaAsset {
            id: Uuid::new_v4(),
            content_ref: content_ref.to_string(),
            thumbnail_ref: None,
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size_bytes,
            content_hash: content_hash.to_string(),
            uploaded_by,
            created_at: Utc::now(),
            requires_thumbnail: MediaAsset::wants_thumbnail(content_type),
        };
        self.assets.insert(&asset).await?;
        tracing::info!(
            "Registered media asset {} ({}, {} bytes)",
            asset.id,
            asset.content_type,
            asset.size_bytes
        );

        // Best effort: registration must not wait out queue
        // backpressure, and the pending flag alone guarantees a later
        // enqueue regenerates the thumbnail.
        if asset.requires_thumbnail {
            if let Err(e) = self
                .queue
                .try_enqueue(Job::new(JobKind::GenerateThumbnail, asset.id))
            {
                tracing::warn!(
                    "Could not queue thumbnail for asset {}: {}; flag remains set",
                    asset.id,
                    e
                );
            }
        }
        Ok(asset)
    }

    pub async fn get(&self, asset_id: Uuid) -> Result<Option<MediaAsset>, MediaError> {
        Ok(self.assets.find(asset_id).await?)
    }

    /// All assets, most recent first.
    pub async fn list(&self) -> Result<Vec<MediaAsset>, MediaError> {
        Ok(self.assets.list().await?)
    }

    /// Signed read URL for the original content.
    pub async fn read_url(&self, asset_id: Uuid) -> Result<SignedUrl, MediaError> {
        let Some(asset) = self.assets.find(asset_id).await? else {
            return Err(MediaError::NotFound);
        };
        Ok(self
            .content
            .signed_url(&asset.content_ref, AccessMode::Read, self.read_url_ttl)
            .await?)
    }

    /// Signed read URL for the thumbnail, or None while the asset has
    /// no generated thumbnail.
    pub async fn thumbnail_url(&self, asset_id: Uuid) -> Result<Option<SignedUrl>, MediaError> {
        let Some(asset) = self.assets.find(asset_id).await? else {
            return Err(MediaError::NotFound);
        };
        let Some(thumbnail_ref) = asset.thumbnail_ref.as_deref() else {
            return Ok(None);
        };
        Ok(Some(
            self.content
                .signed_url(thumbnail_ref, AccessMode::Read, self.read_url_ttl)
                .await?,
        ))
    }

    /// Put a thumbnail job on the queue for an existing asset. The
    /// pipeline itself decides whether there is work to do, so queueing
    /// an already-thumbnailed asset is harmless.
    pub async fn queue_thumbnail(&self, asset_id: Uuid) -> Result<(), MediaError> {
        if self.assets.find(asset_id).await?.is_none() {
            return Err(MediaError::NotFound);
        }
        self.queue
            .enqueue(Job::new(JobKind::GenerateThumbnail, asset_id))
            .await?;
        Ok(())
    }

    /// Generate and store a thumbnail for one asset.
    ///
    /// Never escalates: every failure is logged and leaves
    /// `requires_thumbnail` set, so the work is picked up again on the
    /// next queued job for this asset.
    pub async fn generate_thumbnail(&self, asset_id: Uuid) {
        let asset = match self.assets.find(asset_id).await {
            Ok(Some(asset)) => asset,
            Ok(None) => {
                tracing::warn!("Media asset {} not found for thumbnail", asset_id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load media asset {}: {}", asset_id, e);
                return;
            }
        };
        if !asset.requires_thumbnail {
            return;
        }

        match self.content.exists(&asset.content_ref).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Source object missing for asset {}", asset_id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to check source object for asset {}: {}", asset_id, e);
                return;
            }
        }

        match self.try_generate(&asset).await {
            Ok(()) => tracing::info!("Generated thumbnail for asset {}", asset_id),
            Err(e) => {
                tracing::error!("Failed to generate thumbnail for asset {}: {:#}", asset_id, e)
            }
        }
    }

    async fn try_generate(&self, asset: &MediaAsset) -> anyhow::Result<()> {
        let bytes = self.content.read(&asset.content_ref).await?;
        let mut img = image::load_from_memory(&bytes)?;
        // Fit within the bounding box, keeping aspect ratio. Smaller
        // images pass through at their native size.
        if img.width() > THUMBNAIL_MAX_DIM || img.height() > THUMBNAIL_MAX_DIM {
            img = img.resize(
                THUMBNAIL_MAX_DIM,
                THUMBNAIL_MAX_DIM,
                image::imageops::FilterType::Lanczos3,
            );
        }

        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;

        let thumbnail_ref = MediaAsset::thumbnail_key(asset.id);
        self.content
            .write(&thumbnail_ref, &out, "image/png")
            .await?;

        // One update sets the reference and clears the flag, after the
        // bytes are durably stored.
        let mut updated = asset.clone();
        updated.thumbnail_ref = Some(thumbnail_ref);
        updated.requires_thumbnail = false;
        self.assets.update(&updated).await?;
        Ok(())
    }
}

/// Queue-facing adapter for the thumbnail pipeline. Always reports
/// success to the dispatcher: thumbnail failures are not worth a worker
/// backoff, the pending flag already carries the retry state.
pub struct ThumbnailHandler {
    service: Arc<MediaService>,
}

impl ThumbnailHandler {
    pub fn new(service: Arc<MediaService>) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

#[async_trait]
impl JobHandler for ThumbnailHandler {
    fn kind(&self) -> JobKind {
        JobKind::GenerateThumbnail
    }

    async fn run(&self, job: Job, _shutdown: &CancellationToken) -> anyhow::Result<()> {
        self.service.generate_thumbnail(job.primary_id).await;
        Ok(())
    }
}

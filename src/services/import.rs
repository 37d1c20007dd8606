//! Import pipeline: drives a batch from draft through processing.
//!
//! Processing runs under a distributed lease keyed by batch id, so a
//! dispatcher on another instance that picks up a duplicate job skips
//! the batch instead of double-importing it. Inside a run, each record
//! is isolated: a missing media asset or a failing scenario write is
//! logged against the batch and the loop moves on. Only errors outside
//! the per-record loop (unreadable manifest, dead store) fail the batch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::jobs::{Job, JobHandler, JobKind, JobQueue, QueueError};
use crate::locks::{import_resource, LockError, LockManager};
use crate::models::{
    manifest_key, ImportBatch, ImportBatchLog, ImportBatchStatus, ImportLogLevel, NewScenario,
    ScenarioDefinition,
};
use crate::store::{
    ContentStore, ContentStoreError, ImportBatchRepository, MediaAssetRepository, ScenarioWriter,
    StoreError,
};

/// Batch-creation input. At least one manifest source is required; when
/// both are present the inline definitions win.
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub name: String,
    /// Content-store path of a manifest uploaded ahead of time.
    pub manifest_ref: Option<String>,
    /// Definitions supplied directly with the request.
    pub definitions: Option<Vec<ScenarioDefinition>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("import batch not found")]
    NotFound,
    #[error("either a manifest reference or inline definitions are required")]
    MissingSource,
    #[error("manifest serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("content store error: {0}")]
    Content(#[from] ContentStoreError),
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

pub struct ImportService {
    batches: Arc<dyn ImportBatchRepository>,
    assets: Arc<dyn MediaAssetRepository>,
    scenarios: Arc<dyn ScenarioWriter>,
    content: Arc<dyn ContentStore>,
    locks: Arc<dyn LockManager>,
    queue: Arc<JobQueue>,
    lock_ttl: Duration,
}

impl ImportService {
    pub fn new(
        batches: Arc<dyn ImportBatchRepository>,
        assets: Arc<dyn MediaAssetRepository>,
        scenarios: Arc<dyn ScenarioWriter>,
        content: Arc<dyn ContentStore>,
        locks: Arc<dyn LockManager>,
        queue: Arc<JobQueue>,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            batches,
            assets,
            scenarios,
            content,
            locks,
            queue,
            lock_ttl,
        }
    }

    /// Create a Draft batch. Inline definitions are persisted to the
    /// content store under the batch's deterministic manifest path
    /// before anything can start processing them.
    pub async fn create(
        &self,
        request: ImportRequest,
        requested_by: Uuid,
    ) -> Result<ImportBatch, ImportError> {
        let manifest_ref = request
            .manifest_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from);
        let inline = request.definitions.filter(|d| !d.is_empty());
        if manifest_ref.is_none() && inline.is_none() {
            return Err(ImportError::MissingSource);
        }

        let mut batch = ImportBatch::new(request.name, requested_by, manifest_ref);
        self.batches.insert(&batch).await?;
        self.log(batch.id, ImportLogLevel::Info, "Draft import created")
            .await?;

        if let Some(definitions) = inline {
            let path = manifest_key(batch.id);
            let bytes = serde_json::to_vec_pretty(&definitions)?;
            self.content
                .write(&path, &bytes, "application/json")
                .await?;
            batch.manifest_ref = Some(path.clone());
            self.batches.update(&batch).await?;
            self.log(
                batch.id,
                ImportLogLevel::Info,
                format!("Embedded manifest persisted to {}", path),
            )
            .await?;
        }

        tracing::info!("Created import batch {} ({})", batch.id, batch.name);
        Ok(batch)
    }

    /// Mark the batch Queued and put a processing job on the queue.
    /// A no-op while the batch is Processing or already Completed, so
    /// the operation can be retried freely. Waits when the queue is at
    /// capacity; that wait is the backpressure contract.
    pub async fn queue_processing(&self, batch_id: Uuid) -> Result<(), ImportError> {
        let Some(mut batch) = self.batches.find(batch_id).await? else {
            return Err(ImportError::NotFound);
        };
        if matches!(
            batch.status,
            ImportBatchStatus::Processing | ImportBatchStatus::Completed
        ) {
            tracing::debug!(
                "Import {} is {}; leaving it alone",
                batch_id,
                batch.status.as_str()
            );
            return Ok(());
        }

        batch.status = ImportBatchStatus::Queued;
        batch.processing_started_at = None;
        self.batches.update(&batch).await?;
        self.log(batch.id, ImportLogLevel::Info, "Import queued for processing")
            .await?;

        self.queue
            .enqueue(Job::new(JobKind::ProcessImportBatch, batch.id))
            .await?;
        Ok(())
    }

    /// Run one batch to completion. The job-handler entry point: takes
    /// the lease, re-checks the terminal guard, then works through the
    /// manifest. The lease is released on every exit path.
    pub async fn process(
        &self,
        batch_id: Uuid,
        shutdown: &CancellationToken,
    ) -> Result<(), ImportError> {
        let resource = import_resource(batch_id);
        let Some(lease) = self.locks.try_acquire(&resource, self.lock_ttl).await? else {
            // Another instance is on it, or a run finished between
            // enqueue and dequeue.
            tracing::warn!("Import {} is locked by another worker; skipping", batch_id);
            return Ok(());
        };

        let outcome = self.process_locked(batch_id, shutdown).await;
        if let Err(e) = self.locks.release(&lease).await {
            tracing::warn!("Failed to release import lease for {}: {}", batch_id, e);
        }
        outcome
    }

    async fn process_locked(
        &self,
        batch_id: Uuid,
        shutdown: &CancellationToken,
    ) -> Result<(), ImportError> {
        let Some(mut batch) = self.batches.find(batch_id).await? else {
            tracing::warn!("Import {} no longer exists; dropping job", batch_id);
            return Ok(());
        };
        // The lease is the real guard; this is the idempotent short
        // circuit for duplicate deliveries.
        if batch.status == ImportBatchStatus::Completed {
            tracing::debug!("Import {} already completed", batch_id);
            return Ok(());
        }

        batch.status = ImportBatchStatus::Processing;
        batch.processing_started_at = Some(Utc::now());
        self.batches.update(&batch).await?;
        self.log(batch.id, ImportLogLevel::Info, "Import processing started")
            .await?;
        tracing::info!("Import {} processing started", batch_id);

        match self.run_records(&mut batch, shutdown).await {
            Ok(()) => {
                batch.status = ImportBatchStatus::Completed;
                batch.completed_at = Some(Utc::now());
                self.batches.update(&batch).await?;
                let summary = format!(
                    "Import completed with {}/{} scenarios",
                    batch.processed_records, batch.total_records
                );
                self.log(batch.id, ImportLogLevel::Info, summary.clone())
                    .await?;
                tracing::info!("Import {}: {}", batch_id, summary);
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                batch.status = ImportBatchStatus::Failed;
                batch.failure_reason = Some(reason.clone());
                batch.completed_at = Some(Utc::now());
                self.batches.update(&batch).await?;
                self.log(
                    batch.id,
                    ImportLogLevel::Error,
                    format!("Import failed: {}", reason),
                )
                .await?;
                tracing::error!("Import {} failed: {}", batch_id, reason);
            }
        }
        Ok(())
    }

    /// The per-record loop. Errors returned from here fail the whole
    /// batch; anything recoverable is logged and swallowed inside.
    async fn run_records(
        &self,
        batch: &mut ImportBatch,
        shutdown: &CancellationToken,
    ) -> anyhow::Result<()> {
        let manifest_ref = batch
            .manifest_ref
            .clone()
            .ok_or_else(|| anyhow::anyhow!("batch has no manifest reference"))?;
        let bytes = self.content.read(&manifest_ref).await?;
        let definitions: Vec<ScenarioDefinition> = serde_json::from_slice(&bytes)?;

        batch.total_records = definitions.len() as u32;
        batch.processed_records = 0;
        self.batches.update(batch).await?;

        for definition in &definitions {
            if shutdown.is_cancelled() {
                anyhow::bail!("processing cancelled before record {}", batch.processed_records + 1);
            }
            match self.import_record(batch, definition).await {
                Ok(true) => {
                    batch.processed_records += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    self.log(
                        batch.id,
                        ImportLogLevel::Error,
                        format!("Failed to import {}: {:#}", definition.title, e),
                    )
                    .await?;
                }
            }
        }

        self.batches.update(batch).await?;
        Ok(())
    }

    /// Ok(true) on a created scenario, Ok(false) when the record was
    /// skipped for a missing asset.
    async fn import_record(
        &self,
        batch: &ImportBatch,
        definition: &ScenarioDefinition,
    ) -> anyhow::Result<bool> {
        let Some(asset) = self.assets.find_by_content_ref(&definition.media_ref).await? else {
            self.log(
                batch.id,
                ImportLogLevel::Warning,
                format!("Missing media asset for {}", definition.media_ref),
            )
            .await?;
            return Ok(false);
        };

        self.scenarios
            .create(NewScenario::from_definition(
                definition,
                asset.id,
                batch.requested_by,
            ))
            .await?;
        Ok(true)
    }

    pub async fn get(&self, batch_id: Uuid) -> Result<Option<ImportBatch>, ImportError> {
        Ok(self.batches.find(batch_id).await?)
    }

    /// All batches, most recent first.
    pub async fn list(&self) -> Result<Vec<ImportBatch>, ImportError> {
        Ok(self.batches.list().await?)
    }

    /// Audit trail for one batch in logged order.
    pub async fn logs(&self, batch_id: Uuid) -> Result<Vec<ImportBatchLog>, ImportError> {
        Ok(self.batches.logs(batch_id).await?)
    }

    async fn log(
        &self,
        batch_id: Uuid,
        level: ImportLogLevel,
        message: impl Into<String>,
    ) -> Result<(), StoreError> {
        self.batches
            .append_log(&ImportBatchLog::new(batch_id, level, message))
            .await
    }
}

/// Queue-facing adapter for the import pipeline.
pub struct ImportHandler {
    service: Arc<ImportService>,
}

impl ImportHandler {
    pub fn new(service: Arc<ImportService>) -> Arc<Self> {
        Arc::new(Self { service })
    }
}

#[async_trait]
impl JobHandler for ImportHandler {
    fn kind(&self) -> JobKind {
        JobKind::ProcessImportBatch
    }

    async fn run(&self, job: Job, shutdown: &CancellationToken) -> anyhow::Result<()> {
        self.service.process(job.primary_id, shutdown).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::InMemoryLockManager;
    use crate::models::{MediaAsset, ScenarioDifficulty, ScenarioOutcome};
    use crate::store::{
        InMemoryImportBatchRepository, InMemoryMediaAssetRepository, InMemoryScenarioWriter,
        MemoryContentStore, StoreResult,
    };

    struct Rig {
        batches: Arc<InMemoryImportBatchRepository>,
        assets: Arc<InMemoryMediaAssetRepository>,
        scenarios: Arc<InMemoryScenarioWriter>,
        content: Arc<MemoryContentStore>,
        locks: Arc<InMemoryLockManager>,
        queue: Arc<JobQueue>,
        service: ImportService,
    }

    fn rig() -> Rig {
        let scenarios = Arc::new(InMemoryScenarioWriter::new());
        rig_inner(
            Arc::clone(&scenarios) as Arc<dyn ScenarioWriter>,
            scenarios,
        )
    }

    /// Failure-injection variant; `rig.scenarios` is a detached stand-in
    /// here, so inspect the writer you passed in instead.
    fn rig_with_writer(writer: Arc<dyn ScenarioWriter>) -> Rig {
        rig_inner(writer, Arc::new(InMemoryScenarioWriter::new()))
    }

    fn rig_inner(writer: Arc<dyn ScenarioWriter>, scenarios: Arc<InMemoryScenarioWriter>) -> Rig {
        let batches = Arc::new(InMemoryImportBatchRepository::new());
        let assets = Arc::new(InMemoryMediaAssetRepository::new());
        let content = Arc::new(MemoryContentStore::new());
        let locks = Arc::new(InMemoryLockManager::new());
        let queue = Arc::new(JobQueue::new(16));
        let service = ImportService::new(
            Arc::clone(&batches) as Arc<dyn ImportBatchRepository>,
            Arc::clone(&assets) as Arc<dyn MediaAssetRepository>,
            writer,
            Arc::clone(&content) as Arc<dyn ContentStore>,
            Arc::clone(&locks) as Arc<dyn LockManager>,
            Arc::clone(&queue),
            Duration::from_secs(300),
        );
        Rig {
            batches,
            assets,
            scenarios,
            content,
            locks,
            queue,
            service,
        }
    }

    fn definition(title: &str, media_ref: &str) -> ScenarioDefinition {
        ScenarioDefinition {
            title: title.into(),
            description: format!("{} description", title),
            difficulty: ScenarioDifficulty::Medium,
            correct_outcome: ScenarioOutcome::Fake,
            media_ref: media_ref.into(),
            tags: vec![],
            external_reference: None,
        }
    }

    async fn seed_asset(rig: &Rig, content_ref: &str) -> MediaAsset {
        let asset = MediaAsset {
            id: Uuid::new_v4(),
            content_ref: content_ref.into(),
            thumbnail_ref: None,
            file_name: "clip.png".into(),
            content_type: "image/png".into(),
            size_bytes: 3,
            content_hash: MediaAsset::compute_hash(b"abc"),
            uploaded_by: Uuid::new_v4(),
            created_at: Utc::now(),
            requires_thumbnail: false,
        };
        rig.assets.insert(&asset).await.unwrap();
        asset
    }

    async fn seed_manifest(rig: &Rig, definitions: &[ScenarioDefinition]) -> String {
        let path = "manifests/seeded.json".to_string();
        rig.content
            .write(&path, &serde_json::to_vec(definitions).unwrap(), "application/json")
            .await
            .unwrap();
        path
    }

    fn never_cancelled() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_create_requires_a_manifest_source() {
        let rig = rig();
        let err = rig
            .service
            .create(
                ImportRequest {
                    name: "empty".into(),
                    manifest_ref: Some("   ".into()),
                    definitions: Some(vec![]),
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingSource));
    }

    #[tokio::test]
    async fn test_create_persists_inline_manifest_first() {
        let rig = rig();
        let defs = vec![
            definition("one", "uploads/a.png"),
            definition("two", "uploads/b.png"),
        ];
        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "inline".into(),
                    manifest_ref: None,
                    definitions: Some(defs.clone()),
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let expected_path = manifest_key(batch.id);
        assert_eq!(batch.manifest_ref.as_deref(), Some(expected_path.as_str()));
        assert_eq!(batch.status, ImportBatchStatus::Draft);

        let stored: Vec<ScenarioDefinition> =
            serde_json::from_slice(&rig.content.read(&expected_path).await.unwrap()).unwrap();
        assert_eq!(stored.len(), 2);

        let messages: Vec<String> = rig
            .service
            .logs(batch.id)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert!(messages.iter().any(|m| m == "Draft import created"));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Embedded manifest persisted to manifests/")));
    }

    #[tokio::test]
    async fn test_create_keeps_existing_manifest_ref() {
        let rig = rig();
        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "pre-uploaded".into(),
                    manifest_ref: Some("manifests/custom.json".into()),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        assert_eq!(batch.manifest_ref.as_deref(), Some("manifests/custom.json"));
        // Nothing was written to the content store.
        assert_eq!(rig.content.write_count(), 0);
    }

    #[tokio::test]
    async fn test_queue_processing_marks_and_enqueues() {
        let rig = rig();
        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "queue me".into(),
                    manifest_ref: Some("manifests/m.json".into()),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        rig.service.queue_processing(batch.id).await.unwrap();

        let stored = rig.service.get(batch.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ImportBatchStatus::Queued);

        let job = rig.queue.dequeue().await.unwrap();
        assert_eq!(job.kind, JobKind::ProcessImportBatch);
        assert_eq!(job.primary_id, batch.id);
    }

    #[tokio::test]
    async fn test_queue_processing_is_noop_for_completed() {
        let rig = rig();
        let mut batch = rig
            .service
            .create(
                ImportRequest {
                    name: "done".into(),
                    manifest_ref: Some("manifests/m.json".into()),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        batch.status = ImportBatchStatus::Completed;
        rig.batches.update(&batch).await.unwrap();

        rig.service.queue_processing(batch.id).await.unwrap();
        assert_eq!(
            rig.service.get(batch.id).await.unwrap().unwrap().status,
            ImportBatchStatus::Completed
        );
        // Nothing went on the queue.
        assert_eq!(
            rig.queue.try_enqueue(Job::new(JobKind::ProcessImportBatch, batch.id)),
            Ok(())
        );
        rig.queue.dequeue().await.unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(20), rig.queue.dequeue())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_queue_processing_unknown_batch() {
        let rig = rig();
        assert!(matches!(
            rig.service.queue_processing(Uuid::new_v4()).await,
            Err(ImportError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_process_skips_missing_assets_and_completes() {
        let rig = rig();
        let defs = vec![
            definition("first", "uploads/1.png"),
            definition("second", "uploads/2.png"),
            definition("third", "uploads/3.png"),
            definition("fourth", "uploads/4.png"),
            definition("fifth", "uploads/5.png"),
        ];
        for r in ["uploads/1.png", "uploads/2.png", "uploads/4.png", "uploads/5.png"] {
            seed_asset(&rig, r).await;
        }
        let manifest = seed_manifest(&rig, &defs).await;

        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "partial".into(),
                    manifest_ref: Some(manifest),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        rig.service.queue_processing(batch.id).await.unwrap();
        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();

        let done = rig.service.get(batch.id).await.unwrap().unwrap();
        assert_eq!(done.status, ImportBatchStatus::Completed);
        assert_eq!(done.total_records, 5);
        assert_eq!(done.processed_records, 4);
        assert!(done.completed_at.is_some());
        assert!(done.failure_reason.is_none());

        assert_eq!(rig.scenarios.created().await.len(), 4);

        let logs = rig.service.logs(batch.id).await.unwrap();
        assert!(logs.iter().any(|l| l.level == ImportLogLevel::Warning
            && l.message.contains("uploads/3.png")));
        assert!(logs
            .iter()
            .any(|l| l.message == "Import completed with 4/5 scenarios"));
    }

    #[tokio::test]
    async fn test_reprocessing_completed_batch_creates_nothing() {
        let rig = rig();
        let defs = vec![definition("only", "uploads/1.png")];
        seed_asset(&rig, "uploads/1.png").await;
        let manifest = seed_manifest(&rig, &defs).await;

        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "twice".into(),
                    manifest_ref: Some(manifest),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();
        assert_eq!(rig.scenarios.created().await.len(), 1);

        // Duplicate delivery of the same job id.
        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();
        assert_eq!(rig.scenarios.created().await.len(), 1);
        assert_eq!(
            rig.service.get(batch.id).await.unwrap().unwrap().status,
            ImportBatchStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_process_skips_while_lease_is_held() {
        let rig = rig();
        let defs = vec![definition("only", "uploads/1.png")];
        seed_asset(&rig, "uploads/1.png").await;
        let manifest = seed_manifest(&rig, &defs).await;

        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "contended".into(),
                    manifest_ref: Some(manifest),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        rig.service.queue_processing(batch.id).await.unwrap();

        // Simulate another instance holding the lease.
        let foreign = rig
            .locks
            .try_acquire(&import_resource(batch.id), Duration::from_secs(300))
            .await
            .unwrap()
            .unwrap();

        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();

        let untouched = rig.service.get(batch.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, ImportBatchStatus::Queued);
        assert!(rig.scenarios.created().await.is_empty());

        rig.locks.release(&foreign).await.unwrap();
    }

    #[tokio::test]
    async fn test_lease_is_released_after_processing() {
        let rig = rig();
        let defs = vec![definition("only", "uploads/1.png")];
        seed_asset(&rig, "uploads/1.png").await;
        let manifest = seed_manifest(&rig, &defs).await;

        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "released".into(),
                    manifest_ref: Some(manifest),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();

        // A fresh acquire must succeed immediately.
        let lease = rig
            .locks
            .try_acquire(&import_resource(batch.id), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(lease.is_some());
    }

    #[tokio::test]
    async fn test_missing_manifest_fails_the_batch() {
        let rig = rig();
        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "no manifest".into(),
                    manifest_ref: Some("manifests/never-uploaded.json".into()),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();

        let failed = rig.service.get(batch.id).await.unwrap().unwrap();
        assert_eq!(failed.status, ImportBatchStatus::Failed);
        assert!(failed
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("never-uploaded"));
        assert!(failed.completed_at.is_some());

        let logs = rig.service.logs(batch.id).await.unwrap();
        assert!(logs
            .iter()
            .any(|l| l.level == ImportLogLevel::Error && l.message.starts_with("Import failed:")));

        // The lease is free again even after a failure.
        assert!(rig
            .locks
            .try_acquire(&import_resource(batch.id), Duration::from_secs(1))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_fails_the_batch() {
        let rig = rig();
        rig.content
            .write("manifests/garbled.json", b"{not json", "application/json")
            .await
            .unwrap();
        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "garbled".into(),
                    manifest_ref: Some("manifests/garbled.json".into()),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();
        assert_eq!(
            rig.service.get(batch.id).await.unwrap().unwrap().status,
            ImportBatchStatus::Failed
        );
    }

    struct FailingWriter {
        poisoned_title: String,
        inner: Arc<InMemoryScenarioWriter>,
    }

    #[async_trait]
    impl ScenarioWriter for FailingWriter {
        async fn create(&self, scenario: NewScenario) -> StoreResult<crate::models::Scenario> {
            if scenario.title == self.poisoned_title {
                return Err(StoreError::Backend("constraint violation".into()));
            }
            self.inner.create(scenario).await
        }
    }

    #[tokio::test]
    async fn test_record_failure_does_not_abort_the_batch() {
        let inner = Arc::new(InMemoryScenarioWriter::new());
        let rig = rig_with_writer(Arc::new(FailingWriter {
            poisoned_title: "second".into(),
            inner: Arc::clone(&inner),
        }));

        let defs = vec![
            definition("first", "uploads/1.png"),
            definition("second", "uploads/2.png"),
            definition("third", "uploads/3.png"),
        ];
        for r in ["uploads/1.png", "uploads/2.png", "uploads/3.png"] {
            seed_asset(&rig, r).await;
        }
        let manifest = seed_manifest(&rig, &defs).await;

        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "poisoned".into(),
                    manifest_ref: Some(manifest),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();
        rig.service
            .process(batch.id, &never_cancelled())
            .await
            .unwrap();

        let done = rig.service.get(batch.id).await.unwrap().unwrap();
        assert_eq!(done.status, ImportBatchStatus::Completed);
        assert_eq!(done.total_records, 3);
        assert_eq!(done.processed_records, 2);
        assert_eq!(inner.created().await.len(), 2);

        let logs = rig.service.logs(batch.id).await.unwrap();
        assert!(logs.iter().any(|l| l.level == ImportLogLevel::Error
            && l.message.contains("second")
            && l.message.contains("constraint violation")));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_and_fails_the_batch() {
        let rig = rig();
        let defs = vec![definition("only", "uploads/1.png")];
        seed_asset(&rig, "uploads/1.png").await;
        let manifest = seed_manifest(&rig, &defs).await;

        let batch = rig
            .service
            .create(
                ImportRequest {
                    name: "shutdown".into(),
                    manifest_ref: Some(manifest),
                    definitions: None,
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let token = CancellationToken::new();
        token.cancel();
        rig.service.process(batch.id, &token).await.unwrap();

        let stopped = rig.service.get(batch.id).await.unwrap().unwrap();
        assert_eq!(stopped.status, ImportBatchStatus::Failed);
        assert!(stopped
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("cancelled"));
        assert!(rig.scenarios.created().await.is_empty());
    }
}

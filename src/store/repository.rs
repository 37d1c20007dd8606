//! Repository traits over the external transactional store.
//!
//! The real deployment backs these with the relational database; the
//! in-memory implementations here serve tests and the local CLI host.
//! Transient-failure retry belongs to the adapter behind the trait, not
//! to callers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    ImportBatch, ImportBatchLog, MediaAsset, NewScenario, Scenario, ScenarioStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ImportBatchRepository: Send + Sync {
    async fn insert(&self, batch: &ImportBatch) -> StoreResult<()>;

    /// Persist the batch's current state. NotFound if it was never
    /// inserted.
    async fn update(&self, batch: &ImportBatch) -> StoreResult<()>;

    async fn find(&self, id: Uuid) -> StoreResult<Option<ImportBatch>>;

    /// All batches, most recent first.
    async fn list(&self) -> StoreResult<Vec<ImportBatch>>;

    async fn append_log(&self, log: &ImportBatchLog) -> StoreResult<()>;

    /// Audit trail for one batch in `logged_at` order.
    async fn logs(&self, batch_id: Uuid) -> StoreResult<Vec<ImportBatchLog>>;
}

#[async_trait]
pub trait MediaAssetRepository: Send + Sync {
    async fn insert(&self, asset: &MediaAsset) -> StoreResult<()>;
    async fn update(&self, asset: &MediaAsset) -> StoreResult<()>;
    async fn find(&self, id: Uuid) -> StoreResult<Option<MediaAsset>>;
    async fn find_by_content_ref(&self, content_ref: &str) -> StoreResult<Option<MediaAsset>>;

    /// All assets, most recent first.
    async fn list(&self) -> StoreResult<Vec<MediaAsset>>;
}

/// The import pipeline's only door into the scenario CRUD domain.
#[async_trait]
pub trait ScenarioWriter: Send + Sync {
    async fn create(&self, scenario: NewScenario) -> StoreResult<Scenario>;
}

#[derive(Default)]
pub struct InMemoryImportBatchRepository {
    batches: RwLock<HashMap<Uuid, ImportBatch>>,
    logs: RwLock<Vec<ImportBatchLog>>,
}

impl InMemoryImportBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImportBatchRepository for InMemoryImportBatchRepository {
    async fn insert(&self, batch: &ImportBatch) -> StoreResult<()> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&batch.id) {
            return Err(StoreError::Conflict);
        }
        batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn update(&self, batch: &ImportBatch) -> StoreResult<()> {
        let mut batches = self.batches.write().await;
        if !batches.contains_key(&batch.id) {
            return Err(StoreError::NotFound);
        }
        batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<ImportBatch>> {
        Ok(self.batches.read().await.get(&id).cloned())
    }

    async fn list(&self) -> StoreResult<Vec<ImportBatch>> {
        let mut all: Vec<_> = self.batches.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn append_log(&self, log: &ImportBatchLog) -> StoreResult<()> {
        self.logs.write().await.push(log.clone());
        Ok(())
    }

    async fn logs(&self, batch_id: Uuid) -> StoreResult<Vec<ImportBatchLog>> {
        let mut entries: Vec<_> = self
            .logs
            .read()
            .await
            .iter()
            .filter(|l| l.batch_id == batch_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.logged_at.cmp(&b.logged_at));
        Ok(entries)
    }
}

#[derive(Default)]
pub struct InMemoryMediaAssetRepository {
    assets: RwLock<HashMap<Uuid, MediaAsset>>,
}

impl InMemoryMediaAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaAssetRepository for InMemoryMediaAssetRepository {
    async fn insert(&self, asset: &MediaAsset) -> StoreResult<()> {
        let mut assets = self.assets.write().await;
        if assets.contains_key(&asset.id) {
            return Err(StoreError::Conflict);
        }
        assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn update(&self, asset: &MediaAsset) -> StoreResult<()> {
        let mut assets = self.assets.write().await;
        if !assets.contains_key(&asset.id) {
            return Err(StoreError::NotFound);
        }
        assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<MediaAsset>> {
        Ok(self.assets.read().await.get(&id).cloned())
    }

    async fn find_by_content_ref(&self, content_ref: &str) -> StoreResult<Option<MediaAsset>> {
        Ok(self
            .assets
            .read()
            .await
            .values()
            .find(|a| a.content_ref == content_ref)
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<MediaAsset>> {
        let mut all: Vec<_> = self.assets.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

/// Records every created scenario; tests read them back to check for
/// duplicates.
#[derive(Default)]
pub struct InMemoryScenarioWriter {
    scenarios: RwLock<Vec<Scenario>>,
}

impl InMemoryScenarioWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn created(&self) -> Vec<Scenario> {
        self.scenarios.read().await.clone()
    }
}

#[async_trait]
impl ScenarioWriter for InMemoryScenarioWriter {
    async fn create(&self, scenario: NewScenario) -> StoreResult<Scenario> {
        let created = Scenario {
            id: Uuid::new_v4(),
            title: scenario.title,
            description: scenario.description,
            difficulty: scenario.difficulty,
            correct_outcome: scenario.correct_outcome,
            status: ScenarioStatus::Draft,
            media_asset_id: scenario.media_asset_id,
            created_by: scenario.created_by,
            created_at: Utc::now(),
            external_reference: scenario.external_reference,
            tags: scenario.tags,
        };
        self.scenarios.write().await.push(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImportLogLevel, ScenarioDifficulty, ScenarioOutcome};

    fn batch(name: &str) -> ImportBatch {
        ImportBatch::new(name.into(), Uuid::new_v4(), None)
    }

    #[tokio::test]
    async fn test_insert_update_find() {
        let repo = InMemoryImportBatchRepository::new();
        let mut b = batch("first");
        repo.insert(&b).await.unwrap();

        assert!(matches!(repo.insert(&b).await, Err(StoreError::Conflict)));

        b.total_records = 9;
        repo.update(&b).await.unwrap();
        let found = repo.find(b.id).await.unwrap().unwrap();
        assert_eq!(found.total_records, 9);

        let missing = batch("never inserted");
        assert!(matches!(
            repo.update(&missing).await,
            Err(StoreError::NotFound)
        ));
        assert!(repo.find(missing.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logs_filtered_and_ordered() {
        let repo = InMemoryImportBatchRepository::new();
        let a = batch("a");
        let b = batch("b");
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();

        let mut early = ImportBatchLog::new(a.id, ImportLogLevel::Info, "started");
        let mut late = ImportBatchLog::new(a.id, ImportLogLevel::Error, "record failed");
        early.logged_at = Utc::now() - chrono::Duration::seconds(10);
        late.logged_at = Utc::now();
        let other = ImportBatchLog::new(b.id, ImportLogLevel::Info, "unrelated");

        // Insert out of order; read order comes from logged_at.
        repo.append_log(&late).await.unwrap();
        repo.append_log(&other).await.unwrap();
        repo.append_log(&early).await.unwrap();

        let logs = repo.logs(a.id).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "started");
        assert_eq!(logs[1].message, "record failed");
    }

    #[tokio::test]
    async fn test_asset_lookup_by_content_ref() {
        let repo = InMemoryMediaAssetRepository::new();
        let asset = MediaAsset {
            id: Uuid::new_v4(),
            content_ref: "uploads/x/clip.png".into(),
            thumbnail_ref: None,
            file_name: "clip.png".into(),
            content_type: "image/png".into(),
            size_bytes: 4,
            content_hash: MediaAsset::compute_hash(b"clip"),
            uploaded_by: Uuid::new_v4(),
            created_at: Utc::now(),
            requires_thumbnail: true,
        };
        repo.insert(&asset).await.unwrap();

        let found = repo
            .find_by_content_ref("uploads/x/clip.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, asset.id);
        assert!(repo
            .find_by_content_ref("uploads/x/other.png")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_scenario_writer_assigns_draft() {
        let writer = InMemoryScenarioWriter::new();
        let scenario = writer
            .create(NewScenario {
                title: "t".into(),
                description: String::new(),
                difficulty: ScenarioDifficulty::Easy,
                correct_outcome: ScenarioOutcome::Fake,
                media_asset_id: Uuid::new_v4(),
                created_by: Uuid::new_v4(),
                external_reference: None,
                tags: vec![],
            })
            .await
            .unwrap();
        assert_eq!(scenario.status, ScenarioStatus::Draft);
        assert_eq!(writer.created().await.len(), 1);
    }
}

//! Shared wiring for host processes.
//!
//! An `AppContext` owns every long-lived collaborator: repositories,
//! content store, coordination backends, the job queue and the services
//! built over them. Hosts construct one, hand its dispatcher a shutdown
//! token, and drive work through the services.

use std::sync::Arc;

use crate::config::Settings;
use crate::jobs::{Dispatcher, JobQueue};
use crate::locks::{InMemoryLockManager, LockManager};
use crate::rate_limit::{InMemoryRateLimitBackend, RateLimitBackend, RateLimiter};
use crate::services::{ImportHandler, ImportService, MediaService, ThumbnailHandler};
use crate::store::{
    ContentStore, FsContentStore, ImportBatchRepository, InMemoryImportBatchRepository,
    InMemoryMediaAssetRepository, InMemoryScenarioWriter, MediaAssetRepository, ScenarioWriter,
};

#[cfg(feature = "redis-backend")]
use crate::locks::RedisLockManager;
#[cfg(feature = "redis-backend")]
use crate::rate_limit::RedisRateLimitBackend;

/// Shared state for a host process.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub queue: Arc<JobQueue>,
    pub content: Arc<dyn ContentStore>,
    pub imports: Arc<ImportService>,
    pub media: Arc<MediaService>,
    pub limiter: Arc<RateLimiter>,
    /// Scenario sink for the local host. Real deployments inject a
    /// database-backed writer here instead.
    pub scenarios: Arc<InMemoryScenarioWriter>,
}

impl AppContext {
    /// Wire up a single-process host: filesystem content store under
    /// the data directory, in-memory repositories, coordination
    /// backends chosen by configuration.
    pub async fn for_local(settings: Settings) -> anyhow::Result<Self> {
        settings.ensure_directories()?;
        let content: Arc<dyn ContentStore> =
            Arc::new(FsContentStore::new(settings.content_dir()));
        Self::assemble(settings, content).await
    }

    /// Wire up against an injected content store. Tests use this with
    /// the in-memory store.
    pub async fn assemble(
        settings: Settings,
        content: Arc<dyn ContentStore>,
    ) -> anyhow::Result<Self> {
        let (locks, rate_backend) = coordination_backends(&settings).await?;

        let queue = Arc::new(JobQueue::new(settings.queue_capacity));
        let batches = Arc::new(InMemoryImportBatchRepository::new());
        let assets = Arc::new(InMemoryMediaAssetRepository::new());
        let scenarios = Arc::new(InMemoryScenarioWriter::new());

        let imports = Arc::new(ImportService::new(
            Arc::clone(&batches) as Arc<dyn ImportBatchRepository>,
            Arc::clone(&assets) as Arc<dyn MediaAssetRepository>,
            Arc::clone(&scenarios) as Arc<dyn ScenarioWriter>,
            Arc::clone(&content),
            locks,
            Arc::clone(&queue),
            settings.import_lock_ttl(),
        ));
        let media = Arc::new(MediaService::new(
            Arc::clone(&assets) as Arc<dyn MediaAssetRepository>,
            Arc::clone(&content),
            Arc::clone(&queue),
            settings.upload_url_ttl(),
            settings.read_url_ttl(),
        ));
        let limiter = Arc::new(RateLimiter::new(
            rate_backend,
            settings.rate_limit_permits,
            settings.rate_limit_window(),
        ));

        Ok(Self {
            settings,
            queue,
            content,
            imports,
            media,
            limiter,
            scenarios,
        })
    }

    /// Dispatcher wired with every job handler this host serves.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.queue))
            .register(ImportHandler::new(Arc::clone(&self.imports)))
            .register(ThumbnailHandler::new(Arc::clone(&self.media)))
            .with_workers(self.settings.dispatch_workers)
    }
}

async fn coordination_backends(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn LockManager>, Arc<dyn RateLimitBackend>)> {
    #[cfg(feature = "redis-backend")]
    if let Some(url) = settings.redis_url.as_deref() {
        let locks = RedisLockManager::connect(url).await?;
        let rate = RedisRateLimitBackend::connect(url).await?;
        tracing::info!("Using redis coordination at {}", url);
        return Ok((Arc::new(locks), Arc::new(rate)));
    }

    #[cfg(not(feature = "redis-backend"))]
    if settings.redis_url.is_some() {
        tracing::warn!(
            "redis_url is set but this build has no redis support; using in-process coordination"
        );
    }

    Ok((
        Arc::new(InMemoryLockManager::new()),
        Arc::new(InMemoryRateLimitBackend::new()),
    ))
}

//! Dispatcher: pulls jobs off the queue and routes them to handlers.
//!
//! One failing job never takes a worker down. Handler errors are logged,
//! the worker backs off briefly, and the loop continues; jobs with no
//! registered handler are dropped with a warning. Shutdown is
//! cooperative: workers stop pulling after their current item.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Job, JobKind, JobQueue};

/// One kind of background work. Implementations must be idempotent:
/// delivery is at-least-once and duplicates arrive after re-queues.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn kind(&self) -> JobKind;

    /// Process one job. An error here is isolated to this job; the
    /// dispatcher logs it and moves on without retrying. `shutdown` is
    /// advisory: long-running handlers check it at their own safe
    /// points, nothing interrupts them mid-operation.
    async fn run(&self, job: Job, shutdown: &CancellationToken) -> anyhow::Result<()>;
}

/// Explicitly constructed dispatch component; build with `new`, register
/// handlers, then `start` it on a shutdown token.
pub struct Dispatcher {
    queue: Arc<JobQueue>,
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    workers: usize,
    failure_backoff: Duration,
}

impl Dispatcher {
    pub fn new(queue: Arc<JobQueue>) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            workers: 1,
            failure_backoff: Duration::from_secs(5),
        }
    }

    pub fn register(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Pause after a failed job before the next pull.
    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Spawn the worker tasks. They run until the token is cancelled or
    /// the queue closes.
    pub fn start(self, shutdown: CancellationToken) -> DispatcherHandle {
        let dispatcher = Arc::new(self);
        let handles = (0..dispatcher.workers)
            .map(|worker_id| {
                let dispatcher = Arc::clone(&dispatcher);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    dispatcher.worker_loop(worker_id, shutdown).await;
                })
            })
            .collect();
        DispatcherHandle { shutdown, handles }
    }

    async fn worker_loop(&self, worker_id: usize, shutdown: CancellationToken) {
        tracing::debug!("Dispatch worker {} started", worker_id);
        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                job = self.queue.dequeue() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let Some(handler) = self.handlers.get(&job.kind) else {
                tracing::warn!(
                    "Unknown background job kind {} for {}; dropping",
                    job.kind.as_str(),
                    job.primary_id
                );
                continue;
            };

            let kind = job.kind;
            let target = job.primary_id;
            tracing::debug!("Processing background job {} for {}", kind.as_str(), target);
            if let Err(e) = handler.run(job, &shutdown).await {
                tracing::error!(
                    "Background job {} for {} failed: {:#}",
                    kind.as_str(),
                    target,
                    e
                );
                // Brief pause so a persistently failing job cannot spin
                // the worker hot.
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.failure_backoff) => {}
                }
            }
        }
        tracing::debug!("Dispatch worker {} stopped", worker_id);
    }
}

/// Running dispatcher workers plus the token that stops them.
pub struct DispatcherHandle {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Signal shutdown and wait for every worker to finish its current
    /// job.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        futures::future::join_all(self.handles).await;
    }
}

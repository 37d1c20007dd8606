//! Background work: job descriptors, the bounded queue, the dispatcher.

mod dispatcher;
mod queue;

pub use dispatcher::{Dispatcher, DispatcherHandle, JobHandler};
pub use queue::{JobQueue, QueueError};

use std::collections::HashMap;

use uuid::Uuid;

/// Kind of deferred work a job describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    ProcessImportBatch,
    GenerateThumbnail,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessImportBatch => "process_import_batch",
            Self::GenerateThumbnail => "generate_thumbnail",
        }
    }
}

/// A transient work descriptor. Jobs are never persisted: a restart
/// loses whatever was queued, and progress is reconstructed from the
/// durable state entities plus a re-queue at the API edge.
#[derive(Debug, Clone)]
pub struct Job {
    pub kind: JobKind,
    /// Id of the entity the job targets (batch id, asset id).
    pub primary_id: Uuid,
    pub metadata: HashMap<String, String>,
}

impl Job {
    pub fn new(kind: JobKind, primary_id: Uuid) -> Self {
        Self {
            kind,
            primary_id,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

//! Import batch model and its append-only audit trail.
//!
//! A batch is one run of the import pipeline. Progress and failures are
//! recorded as log rows rather than overwritten state, so partial failures
//! stay visible after the run completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportBatchStatus {
    Draft,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ImportBatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Completed and Failed are terminal; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One import run.
///
/// Mutated only by the import pipeline while it holds the distributed
/// lease for this batch id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: Uuid,
    /// Operator-facing name for the run.
    pub name: String,
    /// Content-store path of the manifest. Set at creation for
    /// pre-uploaded manifests, or when an inline manifest is persisted.
    pub manifest_ref: Option<String>,
    pub status: ImportBatchStatus,
    pub requested_by: Uuid,
    pub total_records: u32,
    pub processed_records: u32,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl ImportBatch {
    /// Create a new batch in Draft status.
    pub fn new(name: String, requested_by: Uuid, manifest_ref: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            manifest_ref,
            status: ImportBatchStatus::Draft,
            requested_by,
            total_records: 0,
            processed_records: 0,
            created_at: Utc::now(),
            processing_started_at: None,
            completed_at: None,
            failure_reason: None,
        }
    }
}

/// Severity of an import audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportLogLevel {
    Info,
    Warning,
    Error,
}

impl ImportLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Append-only audit entry; never mutated or deleted. `logged_at` is the
/// canonical read order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatchLog {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub level: ImportLogLevel,
    pub message: String,
}

impl ImportBatchLog {
    pub fn new(batch_id: Uuid, level: ImportLogLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            logged_at: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

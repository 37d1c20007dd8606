//! Distributed leases for multi-instance mutual exclusion.
//!
//! `try_acquire` is a single atomic set-if-absent with TTL against the
//! coordination store; there is no retry loop and no heartbeat. A crashed
//! holder is recovered by TTL expiry alone, so TTLs must stay generous
//! relative to expected job duration.

mod memory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use memory::InMemoryLockManager;
#[cfg(feature = "redis-backend")]
pub use redis::RedisLockManager;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

/// Namespace shared by all lease keys in the coordination store.
pub const KEY_PREFIX: &str = "locks:";

/// A held lease. The token distinguishes this holder from a later one
/// that acquires the same key after expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub resource: String,
    pub token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
}

pub type LockResult<T> = Result<T, LockError>;

#[async_trait]
pub trait LockManager: Send + Sync {
    /// Take the lease if nobody holds it. `Ok(None)` means another holder
    /// owns the key; callers skip the work rather than wait.
    async fn try_acquire(&self, resource: &str, ttl: Duration) -> LockResult<Option<Lease>>;

    /// Compare-and-delete on the holder token. `Ok(false)` when the lease
    /// already expired or now belongs to someone else; never removes a
    /// foreign holder's lease.
    async fn release(&self, lease: &Lease) -> LockResult<bool>;
}

fn lock_key(resource: &str) -> String {
    format!("{}{}", KEY_PREFIX, resource)
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Lease resource name for one import batch.
pub fn import_resource(batch_id: Uuid) -> String {
    format!("import:{}", batch_id.simple())
}

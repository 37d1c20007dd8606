//! Process-local lock manager with real TTL semantics.
//!
//! Correct only while a single instance runs the dispatcher; multiple
//! instances need the Redis backend.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{lock_key, new_token, Lease, LockManager, LockResult};

struct LeaseEntry {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryLockManager {
    leases: RwLock<HashMap<String, LeaseEntry>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn try_acquire(&self, resource: &str, ttl: Duration) -> LockResult<Option<Lease>> {
        let key = lock_key(resource);
        let now = Instant::now();
        let mut leases = self.leases.write().await;

        if let Some(entry) = leases.get(&key) {
            if entry.expires_at > now {
                return Ok(None);
            }
        }

        let token = new_token();
        leases.insert(
            key,
            LeaseEntry {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(Some(Lease {
            resource: resource.to_string(),
            token,
        }))
    }

    async fn release(&self, lease: &Lease) -> LockResult<bool> {
        let key = lock_key(&lease.resource);
        let now = Instant::now();
        let mut leases = self.leases.write().await;

        match leases.get(&key) {
            // An expired entry is equivalent to a missing key; drop it
            // without crediting the release.
            Some(entry) if entry.expires_at <= now => {
                leases.remove(&key);
                Ok(false)
            }
            Some(entry) if entry.token == lease.token => {
                leases.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

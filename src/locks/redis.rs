//! Redis-backed lock manager for multi-instance deployments.
//!
//! Acquisition is `SET key token NX PX ttl`; release is a Lua
//! compare-and-delete so only the holder that set the token can remove
//! the key. Expiry is left entirely to Redis.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;

use super::{lock_key, new_token, Lease, LockError, LockManager, LockResult};

/// Deletes the key only while it still carries the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

pub struct RedisLockManager {
    conn: ConnectionManager,
}

impl RedisLockManager {
    /// Connect to Redis at the given URL.
    pub async fn connect(redis_url: &str) -> LockResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| LockError::Unavailable(format!("Redis connection error: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::Unavailable(format!("Redis connection manager error: {}", e)))?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl LockManager for RedisLockManager {
    async fn try_acquire(&self, resource: &str, ttl: Duration) -> LockResult<Option<Lease>> {
        let mut conn = self.conn.clone();
        let token = new_token();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(lock_key(resource))
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Unavailable(e.to_string()))?;

        Ok(acquired.map(|_| Lease {
            resource: resource.to_string(),
            token,
        }))
    }

    async fn release(&self, lease: &Lease) -> LockResult<bool> {
        let mut conn = self.conn.clone();

        let removed: i64 = Script::new(RELEASE_SCRIPT)
            .key(lock_key(&lease.resource))
            .arg(&lease.token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Unavailable(e.to_string()))?;

        Ok(removed == 1)
    }
}

impl Clone for RedisLockManager {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_script_compares_before_deleting() {
        assert!(RELEASE_SCRIPT.contains("GET"));
        assert!(RELEASE_SCRIPT.contains("DEL"));
        assert!(RELEASE_SCRIPT.contains("ARGV[1]"));
    }
}

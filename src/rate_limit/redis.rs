//! Redis-backed admission windows for multi-instance deployments.
//!
//! The prune + insert + TTL refresh + count sequence runs as one Lua
//! script, so concurrent requests against the same subject see a
//! consistent window.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use uuid::Uuid;

use super::backend::{window_key, RateLimitBackend, RateLimitError, RateLimitResult};

/// ARGV: now_ms, window_ms, ttl_secs, member.
const WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now_ms - window_ms)
redis.call('ZADD', key, now_ms, ARGV[4])
redis.call('EXPIRE', key, tonumber(ARGV[3]))
return redis.call('ZCARD', key)
"#;

pub struct RedisRateLimitBackend {
    conn: ConnectionManager,
}

impl RedisRateLimitBackend {
    /// Connect to Redis at the given URL.
    pub async fn connect(redis_url: &str) -> RateLimitResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RateLimitError::Unavailable(format!("Redis connection error: {}", e)))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            RateLimitError::Unavailable(format!("Redis connection manager error: {}", e))
        })?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateLimitBackend for RedisRateLimitBackend {
    async fn record_and_count(&self, subject: &str, window: Duration) -> RateLimitResult<usize> {
        let mut conn = self.conn.clone();
        let now_ms = chrono::Utc::now().timestamp_millis();
        // EXPIRE 0 would delete the key outright.
        let ttl_secs = window.as_secs().max(1);

        let count: i64 = Script::new(WINDOW_SCRIPT)
            .key(window_key(subject))
            .arg(now_ms)
            .arg(window.as_millis() as u64)
            .arg(ttl_secs)
            .arg(Uuid::new_v4().simple().to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;

        Ok(count.max(0) as usize)
    }
}

impl Clone for RedisRateLimitBackend {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

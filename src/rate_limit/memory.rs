//! In-memory admission windows for single-instance deployments.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::backend::{window_key, RateLimitBackend, RateLimitResult};

struct SubjectWindow {
    entries: Vec<Instant>,
    /// Mirrors the Redis key TTL: the subject is dropped wholesale once
    /// this passes, so abandoned subjects self-clean.
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryRateLimitBackend {
    windows: RwLock<HashMap<String, SubjectWindow>>,
}

impl InMemoryRateLimitBackend {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn tracked_subjects(&self) -> usize {
        self.windows.read().await.len()
    }
}

#[async_trait]
impl RateLimitBackend for InMemoryRateLimitBackend {
    async fn record_and_count(&self, subject: &str, window: Duration) -> RateLimitResult<usize> {
        let key = window_key(subject);
        let now = Instant::now();
        let mut windows = self.windows.write().await;

        // Expired subjects first, then this subject's stale entries.
        windows.retain(|_, w| w.expires_at > now);

        let entry = windows.entry(key).or_insert_with(|| SubjectWindow {
            entries: Vec::new(),
            expires_at: now + window,
        });
        entry.entries.retain(|t| now.duration_since(*t) < window);
        entry.entries.push(now);
        entry.expires_at = now + window;

        Ok(entry.entries.len())
    }
}

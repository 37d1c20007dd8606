//! Backend trait for sliding-window admission state.

use std::time::Duration;

use async_trait::async_trait;

/// Key prefix for admission windows in the coordination store.
pub const KEY_PREFIX: &str = "ratelimit:";

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("coordination store unavailable: {0}")]
    Unavailable(String),
}

pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Storage for per-subject request windows.
///
/// The whole prune-insert-refresh sequence must be one atomic batch so
/// concurrent requests from the same subject cannot under- or
/// over-count.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Drop entries older than `window`, record the current request,
    /// refresh the key's TTL to the window length, and return the
    /// resulting entry count.
    async fn record_and_count(&self, subject: &str, window: Duration) -> RateLimitResult<usize>;
}

pub(crate) fn window_key(subject: &str) -> String {
    format!("{}{}", KEY_PREFIX, subject)
}

//! Sliding-window request admission control.
//!
//! One backend trait with two implementations: in-memory for a single
//! instance and Redis for shared state across instances. The limiter
//! façade applies subject keying and the admin bypass on top.

mod backend;
mod limiter;
mod memory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use backend::{RateLimitBackend, RateLimitError, RateLimitResult, KEY_PREFIX};
pub use limiter::{AdmissionDecision, ClientIdentity, RateLimiter};
pub use memory::InMemoryRateLimitBackend;
#[cfg(feature = "redis-backend")]
pub use redis::RedisRateLimitBackend;

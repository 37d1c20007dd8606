//! Scenarium - training-scenario content management core.
//!
//! The asynchronous backbone of a scenario CMS: a bounded background job
//! queue with a dispatching worker loop, distributed leases for
//! multi-instance safety, a manifest-driven import pipeline, idempotent
//! thumbnail generation, and sliding-window request admission. Relational
//! persistence and HTTP serving stay behind narrow traits so the core can
//! run against in-memory backends (tests, single process) or shared
//! infrastructure (Redis) unchanged.

pub mod app;
pub mod cli;
pub mod config;
pub mod jobs;
pub mod locks;
pub mod models;
pub mod rate_limit;
pub mod services;
pub mod store;

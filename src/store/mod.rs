//! Storage seams: content-addressable blob store and repository traits.
//!
//! The relational layer and object storage live outside this crate; the
//! pipelines only see the traits here. In-memory implementations back
//! tests and single-process hosts, the filesystem store backs the CLI.

mod content;
mod fs;
mod memory;
mod repository;

pub use content::{AccessMode, ContentResult, ContentStore, ContentStoreError, SignedUrl};
pub use fs::FsContentStore;
pub use memory::MemoryContentStore;
pub use repository::{
    ImportBatchRepository, InMemoryImportBatchRepository, InMemoryMediaAssetRepository,
    InMemoryScenarioWriter, MediaAssetRepository, ScenarioWriter, StoreError, StoreResult,
};

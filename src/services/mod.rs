//! Application services driving the pipelines.

mod import;
mod media;

pub use import::{ImportError, ImportHandler, ImportRequest, ImportService};
pub use media::{MediaError, MediaService, ThumbnailHandler, UploadTicket};

//! Domain models.

mod import;
mod media;
mod scenario;

pub use import::*;
pub use media::*;
pub use scenario::*;

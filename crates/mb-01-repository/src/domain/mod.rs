//! Domain layer: pure types, no I/O.

pub mod cache;
pub mod pointer;
pub mod retention;

pub use cache::DirectoryCache;
pub use pointer::BlobPointer;
pub use retention::{select_expired, CleanupReport};

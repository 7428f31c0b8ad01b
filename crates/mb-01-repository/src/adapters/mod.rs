//! Adapters layer: concrete repository transports.

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemRepository;
pub use memory::{InMemoryRepository, RepositoryStats};

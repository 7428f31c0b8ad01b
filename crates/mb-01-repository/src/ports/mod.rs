//! Ports layer: the blob transfer protocol.

pub mod outbound;

pub use outbound::{Credentials, RepositoryEndpoint, RepositorySession, RepositoryTransport};

//! # MB-01 Repository
//!
//! Blob store connector for the modelling bus. Payloads too large to travel
//! inline in an event are uploaded here and referenced by a [`BlobPointer`].
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): no I/O
//!   - `BlobPointer`: address of a stored object
//!   - `DirectoryCache`: remote directories already known to exist
//!   - `retention`: which objects a cleanup removes
//!
//! - **Ports Layer** (`ports/`): the blob transfer protocol
//!   - `RepositoryTransport` / `RepositorySession`: directory-create, store,
//!     retrieve, list, delete
//!
//! - **Adapters Layer** (`adapters/`)
//!   - `FileSystemRepository`: endpoints mapped onto local directories
//!   - `InMemoryRepository`: object map with operation counters
//!
//! - **Service** (`service`): `RepositoryConnector`
//!
//! ## Invariants
//!
//! - A directory-creation sequence runs at most once per remote path and
//!   connector (cache hit afterwards); repeating one is harmless.
//! - An upload either returns a pointer to an object that exists or fails.
//! - Temporary local files are removed whether the transfer succeeded or not.
//!
//! ## Usage
//!
//! ```ignore
//! use mb_01_repository::{InMemoryRepository, RepositoryConnector};
//!
//! let connector = RepositoryConnector::new(&config, Arc::new(InMemoryRepository::new()), timestamps);
//! let pointer = connector.upload_json_payload("observations/json/o1", br#"{"v":1}"#).await?;
//! let local = connector.download(&pointer, "2025-11-03-09-30-00-000000-0000").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod scratch;
pub mod service;

pub use adapters::{FileSystemRepository, InMemoryRepository, RepositoryStats};
pub use domain::{BlobPointer, CleanupReport, DirectoryCache};
pub use error::RepositoryError;
pub use ports::{Credentials, RepositoryEndpoint, RepositorySession, RepositoryTransport};
pub use scratch::ScratchFile;
pub use service::RepositoryConnector;

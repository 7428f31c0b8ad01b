//! # Shared Types Crate
//!
//! Types shared by every layer of the modelling bus.
//!
//! ## Contents
//!
//! - [`config`]: `BusConfig`, the configuration surface consumed by the connectors
//! - [`errors`]: `BusError`, the error kinds reported through the sink
//! - [`reporter`]: `ErrorReporter`, the single injected error sink
//! - [`timestamp`]: `TimestampSource`, fixed-width and lexicographically monotonic
//! - [`topics`]: topic path grammar for artefacts, observations and coordination
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: topic layout and timestamp format live here only.
//! - **Report, don't throw**: transport-facing operations report failures
//!   through an [`ErrorReporter`] instead of returning them to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod errors;
pub mod reporter;
pub mod timestamp;
pub mod topics;

pub use config::{BusConfig, ConfigError, RepositoryConfig};
pub use errors::BusError;
pub use reporter::{ErrorLog, ErrorReporter, ReportedError, TracingErrorReporter};
pub use timestamp::{SystemTimestamps, TimestampSource};
pub use topics::TopicBase;

/// Version segment that roots every topic on the bus and in the repository.
pub const MODELLING_BUS_VERSION: &str = "mbus-1";

/// File extension used for JSON payloads moved through the repository.
pub const JSON_FILE_EXTENSION: &str = ".json";

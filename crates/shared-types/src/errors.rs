//! # Error Types
//!
//! Error kinds reported by the modelling bus. None of these are escalated to
//! termination: each one aborts a single operation at most.

use thiserror::Error;

/// Errors reported through the [`ErrorReporter`](crate::ErrorReporter) sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The blob store could not be reached.
    #[error("Connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    /// A transfer to the blob store failed after the connection was established.
    #[error("Upload to {path} failed: {reason}")]
    Upload { path: String, reason: String },

    /// A transfer from the blob store failed after the connection was established.
    #[error("Download of {path} failed: {reason}")]
    Download { path: String, reason: String },

    /// Stored content could not be fetched: a posted blob on receipt, or a
    /// repository listing.
    #[error("Retrieval from {location} failed: {reason}")]
    Retrieval { location: String, reason: String },

    /// JSON marshalling of an envelope, delta or payload failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A delta was based on a state other than the receiver's current one.
    #[error("Received update out of order for artefact {artefact_id}: based on state {received}, current state is {expected}")]
    OutOfOrder {
        artefact_id: String,
        expected: String,
        received: String,
    },

    /// A protocol phase was attempted before any state was communicated.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A JSON patch could not be applied to its base document.
    #[error("Applying patch failed: {0}")]
    PatchApplication(String),

    /// The event bus refused a publish, subscribe, fetch or delete.
    #[error("Event bus error on {topic}: {reason}")]
    Publish { topic: String, reason: String },

    /// A local scratch file could not be written, read or removed.
    #[error("Local file error on {path}: {reason}")]
    Io { path: String, reason: String },
}

impl BusError {
    /// Shorthand for an encoding failure from serde_json.
    pub fn encoding(error: impl std::fmt::Display) -> Self {
        BusError::Encoding(error.to_string())
    }

    /// Shorthand for a local file failure.
    pub fn io(path: impl AsRef<std::path::Path>, error: impl std::fmt::Display) -> Self {
        BusError::Io {
            path: path.as_ref().display().to_string(),
            reason: error.to_string(),
        }
    }

    /// Short, stable name of the error kind (used as a log field).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::Connection { .. } => "connection",
            BusError::Upload { .. } => "upload",
            BusError::Download { .. } => "download",
            BusError::Retrieval { .. } => "retrieval",
            BusError::Encoding(_) => "encoding",
            BusError::OutOfOrder { .. } => "out_of_order",
            BusError::ProtocolViolation(_) => "protocol_violation",
            BusError::PatchApplication(_) => "patch_application",
            BusError::Publish { .. } => "publish",
            BusError::Io { .. } => "io",
        }
    }
}

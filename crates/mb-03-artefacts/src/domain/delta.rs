//! Delta message: a JSON Patch relative to a known state.

use json_patch::Patch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::BusError;

/// Changes from one state of an artefact to the next, as published on the
/// update and considering topics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    /// RFC 6902 operations.
    pub operations: Patch,
    /// When this delta was made.
    pub timestamp: String,
    /// Timestamp of the state posting the delta is relative to.
    #[serde(rename = "state timestamp")]
    pub state_timestamp: String,
}

impl Delta {
    /// Patch turning `from` into `to`.
    pub fn between(
        from: &Value,
        to: &Value,
        timestamp: impl Into<String>,
        state_timestamp: impl Into<String>,
    ) -> Self {
        Self {
            operations: json_patch::diff(from, to),
            timestamp: timestamp.into(),
            state_timestamp: state_timestamp.into(),
        }
    }

    /// JSON form for publishing.
    pub fn encode(&self) -> Result<Vec<u8>, BusError> {
        serde_json::to_vec(self).map_err(BusError::encoding)
    }

    /// Parse a received delta. Anything malformed is an encoding error.
    pub fn decode(bytes: &[u8]) -> Result<Self, BusError> {
        serde_json::from_slice(bytes).map_err(BusError::encoding)
    }

    /// Apply to a copy of `base`; `base` itself is never touched.
    pub fn apply_to(&self, base: &Value) -> Result<Value, BusError> {
        let mut document = base.clone();
        json_patch::patch(&mut document, &self.operations.0)
            .map_err(|e| BusError::PatchApplication(e.to_string()))?;
        Ok(document)
    }

    /// Whether applying the delta changes nothing.
    pub fn is_empty(&self) -> bool {
        self.operations.0.is_empty()
    }
}

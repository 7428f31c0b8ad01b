//! Per-artefact synchronization state.

use super::delta::Delta;
use serde_json::Value;
use shared_types::BusError;

/// What one agent knows about one artefact.
///
/// Starts `Uninitialized` (`state_communicated == false`, contents `null`)
/// with a locally generated timestamp that no delta can be based on, so
/// deltas arriving before any state are rejected as out of order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtefactState {
    /// Artefact followed.
    pub artefact_id: String,
    /// Version of the artefact's JSON format.
    pub json_version: String,
    /// Content of the last state posting.
    pub current: Value,
    /// `current` with the last update applied.
    pub updated: Value,
    /// `updated` with the last considered change applied.
    pub considered: Value,
    /// Timestamp of the state posting every delta must be based on.
    pub last_state_timestamp: String,
    /// Whether a state was posted or received yet.
    pub state_communicated: bool,
}

impl ArtefactState {
    /// Uninitialized state whose timestamp is `initial_timestamp`.
    pub fn new(
        artefact_id: impl Into<String>,
        json_version: impl Into<String>,
        initial_timestamp: impl Into<String>,
    ) -> Self {
        Self {
            artefact_id: artefact_id.into(),
            json_version: json_version.into(),
            current: Value::Null,
            updated: Value::Null,
            considered: Value::Null,
            last_state_timestamp: initial_timestamp.into(),
            state_communicated: false,
        }
    }

    /// Take `content` as the new state (posted or received).
    pub fn adopt_state(&mut self, content: Value, timestamp: impl Into<String>) {
        self.current = content.clone();
        self.updated = content.clone();
        self.considered = content;
        self.last_state_timestamp = timestamp.into();
        self.state_communicated = true;
    }

    /// Delta from current to `proposed` content, relative to the last state.
    pub fn update_delta(&self, proposed: &Value, timestamp: impl Into<String>) -> Delta {
        Delta::between(
            &self.current,
            proposed,
            timestamp,
            self.last_state_timestamp.clone(),
        )
    }

    /// Delta from updated to `proposed` content, relative to the last state.
    pub fn considering_delta(&self, proposed: &Value, timestamp: impl Into<String>) -> Delta {
        Delta::between(
            &self.updated,
            proposed,
            timestamp,
            self.last_state_timestamp.clone(),
        )
    }

    /// Received state posting.
    pub fn apply_state(&mut self, payload: &[u8], timestamp: &str) -> Result<(), BusError> {
        let content: Value = serde_json::from_slice(payload).map_err(BusError::encoding)?;
        self.adopt_state(content, timestamp);
        Ok(())
    }

    /// Received update posting: `updated = considered = patch(current)`.
    /// Nothing changes on error.
    pub fn apply_update(&mut self, payload: &[u8]) -> Result<(), BusError> {
        let delta = Delta::decode(payload)?;
        self.check_base(&delta)?;
        let updated = delta.apply_to(&self.current)?;
        self.considered = updated.clone();
        self.updated = updated;
        Ok(())
    }

    /// Received considering posting: `considered = patch(updated)`.
    /// Nothing changes on error.
    ///
    /// The base check uses the last *state* timestamp, as for updates, even
    /// though the patch is relative to the updated content.
    pub fn apply_considering(&mut self, payload: &[u8]) -> Result<(), BusError> {
        let delta = Delta::decode(payload)?;
        self.check_base(&delta)?;
        self.considered = delta.apply_to(&self.updated)?;
        Ok(())
    }

    fn check_base(&self, delta: &Delta) -> Result<(), BusError> {
        if delta.state_timestamp != self.last_state_timestamp {
            return Err(BusError::OutOfOrder {
                artefact_id: self.artefact_id.clone(),
                expected: self.last_state_timestamp.clone(),
                received: delta.state_timestamp.clone(),
            });
        }
        Ok(())
    }
}

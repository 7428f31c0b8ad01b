//! Artefact listener callbacks and phase routing.

use crate::domain::ArtefactState;
use shared_types::topics::{
    artefact_considering_topic, artefact_state_topic, artefact_update_topic,
};
use std::fmt;

/// The three protocol phases, one sub-topic each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Full content of the artefact.
    State,
    /// Delta against the last state content, agreed upon.
    Update,
    /// Delta against the updated content, under consideration.
    Considering,
}

impl Phase {
    /// Every phase, in protocol order.
    pub const ALL: [Phase; 3] = [Phase::State, Phase::Update, Phase::Considering];

    /// Relative topic of this phase for an artefact.
    pub fn topic(self, artefact_id: &str, json_version: &str) -> String {
        match self {
            Phase::State => artefact_state_topic(artefact_id, json_version),
            Phase::Update => artefact_update_topic(artefact_id, json_version),
            Phase::Considering => artefact_considering_topic(artefact_id, json_version),
        }
    }

    /// Which phase a relative topic belongs to, if any.
    pub fn of_topic(topic: &str, artefact_id: &str, json_version: &str) -> Option<Phase> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.topic(artefact_id, json_version) == topic)
    }

    /// Sub-topic name of the phase.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::State => "state",
            Phase::Update => "update",
            Phase::Considering => "considering",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Callback = Box<dyn FnMut(&ArtefactState) + Send>;

/// Callbacks for received postings. Each one runs after the posting has
/// been applied, with the artefact's state still locked; a posting that
/// was rejected does not trigger its callback.
#[derive(Default)]
pub struct ArtefactListener {
    on_state: Option<Callback>,
    on_update: Option<Callback>,
    on_considering: Option<Callback>,
}

impl ArtefactListener {
    /// Listener with no callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` after a received state was adopted.
    pub fn on_state(mut self, callback: impl FnMut(&ArtefactState) + Send + 'static) -> Self {
        self.on_state = Some(Box::new(callback));
        self
    }

    /// Run `callback` after a received update was applied.
    pub fn on_update(mut self, callback: impl FnMut(&ArtefactState) + Send + 'static) -> Self {
        self.on_update = Some(Box::new(callback));
        self
    }

    /// Run `callback` after a received considered change was applied.
    pub fn on_considering(
        mut self,
        callback: impl FnMut(&ArtefactState) + Send + 'static,
    ) -> Self {
        self.on_considering = Some(Box::new(callback));
        self
    }

    pub(crate) fn notify(&mut self, phase: Phase, state: &ArtefactState) {
        let callback = match phase {
            Phase::State => self.on_state.as_mut(),
            Phase::Update => self.on_update.as_mut(),
            Phase::Considering => self.on_considering.as_mut(),
        };
        if let Some(callback) = callback {
            callback(state);
        }
    }
}

impl fmt::Debug for ArtefactListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtefactListener")
            .field("on_state", &self.on_state.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_considering", &self.on_considering.is_some())
            .finish()
    }
}

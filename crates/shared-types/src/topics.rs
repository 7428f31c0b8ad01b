//! # Topic Path Grammar
//!
//! ASCII, `/`-separated topic paths:
//!
//! ```text
//! artefacts/file/<id>/<version>/{state,update,considering}
//! observations/{raw,json,streamed}/<id>
//! coordination/<id>
//! ```
//!
//! On the bus every path is rooted under `<busVersion>/<experimentID>/<agentID>`;
//! in the repository under `<prefix>/<busVersion>/<experimentID>/<agentID>`.

use crate::MODELLING_BUS_VERSION;

/// Root of all artefact topics.
pub const ARTEFACTS_PATH_ELEMENT: &str = "artefacts/file";
/// Sub-topic for full artefact states.
pub const ARTEFACT_STATE_PATH_ELEMENT: &str = "state";
/// Sub-topic for agreed deltas.
pub const ARTEFACT_UPDATE_PATH_ELEMENT: &str = "update";
/// Sub-topic for deltas under consideration.
pub const ARTEFACT_CONSIDERING_PATH_ELEMENT: &str = "considering";

/// Root of raw file observations.
pub const RAW_OBSERVATIONS_PATH_ELEMENT: &str = "observations/raw";
/// Root of JSON document observations.
pub const JSON_OBSERVATIONS_PATH_ELEMENT: &str = "observations/json";
/// Root of streamed JSON observations.
pub const STREAMED_OBSERVATIONS_PATH_ELEMENT: &str = "observations/streamed";

/// Root of coordination messages.
pub const COORDINATION_PATH_ELEMENT: &str = "coordination";

/// `<busVersion>/<experimentID>`, the root shared by all agents of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicBase(String);

impl TopicBase {
    /// Base for `experiment_id` under the current bus version.
    pub fn new(experiment_id: &str) -> Self {
        Self(format!("{}/{}", MODELLING_BUS_VERSION, experiment_id))
    }

    /// `<busVersion>/<experimentID>`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full bus topic of `topic_path` as published by `agent_id`.
    pub fn agent_topic(&self, agent_id: &str, topic_path: &str) -> String {
        format!("{}/{}/{}", self.0, agent_id, topic_path)
    }

    /// Repository directory that holds `agent_id`'s blobs.
    pub fn repository_root(&self, prefix: &str, agent_id: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", self.0, agent_id)
        } else {
            format!("{}/{}/{}", prefix, self.0, agent_id)
        }
    }
}

impl std::fmt::Display for TopicBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// `artefacts/file/<id>/<version>`
pub fn artefact_topic(artefact_id: &str, json_version: &str) -> String {
    format!("{}/{}/{}", ARTEFACTS_PATH_ELEMENT, artefact_id, json_version)
}

/// `artefacts/file/<id>/<version>/state`
pub fn artefact_state_topic(artefact_id: &str, json_version: &str) -> String {
    format!(
        "{}/{}",
        artefact_topic(artefact_id, json_version),
        ARTEFACT_STATE_PATH_ELEMENT
    )
}

/// `artefacts/file/<id>/<version>/update`
pub fn artefact_update_topic(artefact_id: &str, json_version: &str) -> String {
    format!(
        "{}/{}",
        artefact_topic(artefact_id, json_version),
        ARTEFACT_UPDATE_PATH_ELEMENT
    )
}

/// `artefacts/file/<id>/<version>/considering`
pub fn artefact_considering_topic(artefact_id: &str, json_version: &str) -> String {
    format!(
        "{}/{}",
        artefact_topic(artefact_id, json_version),
        ARTEFACT_CONSIDERING_PATH_ELEMENT
    )
}

/// `observations/raw/<id>`
pub fn raw_observations_topic(observation_id: &str) -> String {
    format!("{}/{}", RAW_OBSERVATIONS_PATH_ELEMENT, observation_id)
}

/// `observations/json/<id>`
pub fn json_observations_topic(observation_id: &str) -> String {
    format!("{}/{}", JSON_OBSERVATIONS_PATH_ELEMENT, observation_id)
}

/// `observations/streamed/<id>`
pub fn streamed_observations_topic(observation_id: &str) -> String {
    format!("{}/{}", STREAMED_OBSERVATIONS_PATH_ELEMENT, observation_id)
}

/// `coordination/<id>`
pub fn coordination_topic(coordination_id: &str) -> String {
    format!("{}/{}", COORDINATION_PATH_ELEMENT, coordination_id)
}

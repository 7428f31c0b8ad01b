//! Artefact connector service.

use crate::domain::{ArtefactState, Delta};
use crate::listener::{ArtefactListener, Phase};
use mb_02_transport::{ListenerHandle, ModellingBusConnector, Posting};
use serde_json::Value;
use shared_types::BusError;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Posts and follows one artefact (ID and JSON version) on behalf of one
/// agent.
///
/// Clones share the same state, so a listener started from a clone updates
/// what [`snapshot`](Self::snapshot) returns on the original. Failures are
/// reported through the transport's error sink; a failed operation leaves
/// the state unchanged.
#[derive(Clone)]
pub struct ArtefactConnector {
    transport: ModellingBusConnector,
    artefact_id: String,
    json_version: String,
    state: Arc<Mutex<ArtefactState>>,
}

impl ArtefactConnector {
    /// Connector for `artefact_id` in format `json_version`. The state starts
    /// uninitialized, stamped with a fresh timestamp.
    pub fn new(
        transport: ModellingBusConnector,
        json_version: impl Into<String>,
        artefact_id: impl Into<String>,
    ) -> Self {
        let artefact_id = artefact_id.into();
        let json_version = json_version.into();
        let state = ArtefactState::new(&artefact_id, &json_version, transport.new_timestamp());
        Self {
            transport,
            artefact_id,
            json_version,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Identifier of the followed artefact.
    pub fn artefact_id(&self) -> &str {
        &self.artefact_id
    }

    /// Version of the artefact's JSON format.
    pub fn json_version(&self) -> &str {
        &self.json_version
    }

    /// Copy of the current synchronization state.
    pub async fn snapshot(&self) -> ArtefactState {
        self.state.lock().await.clone()
    }

    fn topic(&self, phase: Phase) -> String {
        phase.topic(&self.artefact_id, &self.json_version)
    }

    fn report(&self, operation: &str, error: &BusError) {
        self.transport.reporter().report(
            &format!("{} {}/{}", operation, self.artefact_id, self.json_version),
            error,
        );
    }

    // =========================================================================
    // Posting
    // =========================================================================

    /// Publish the full content as the new state.
    pub async fn post_state(&self, content: Value) {
        let mut state = self.state.lock().await;
        self.post_state_locked(&mut state, content).await;
    }

    async fn post_state_locked(&self, state: &mut ArtefactState, content: Value) {
        let payload = match serde_json::to_vec(&content) {
            Ok(payload) => payload,
            Err(e) => return self.report("post state", &BusError::encoding(e)),
        };
        let timestamp = self.transport.new_timestamp();

        match self
            .transport
            .post_payload(&self.topic(Phase::State), payload, &timestamp)
            .await
        {
            Ok(()) => {
                state.adopt_state(content, timestamp);
                info!(artefact = %self.artefact_id, timestamp = %state.last_state_timestamp, "State posted");
            }
            Err(e) => self.report("post state", &e),
        }
    }

    /// Publish the change from current to `proposed` content. Without a
    /// prior state this posts `proposed` as the state instead.
    pub async fn post_update(&self, proposed: Value) {
        let mut state = self.state.lock().await;
        if !state.state_communicated {
            debug!(artefact = %self.artefact_id, "No state communicated yet, posting update as state");
            return self.post_state_locked(&mut state, proposed).await;
        }

        let delta = state.update_delta(&proposed, self.transport.new_timestamp());
        match self.post_delta(Phase::Update, &delta).await {
            Ok(()) => state.updated = proposed,
            Err(e) => self.report("post update", &e),
        }
    }

    /// Publish the pending update (current → updated) followed by the
    /// considered change (updated → `proposed`). Requires a prior state.
    pub async fn post_considering(&self, proposed: Value) {
        let mut state = self.state.lock().await;
        if !state.state_communicated {
            return self.report(
                "post considering",
                &BusError::ProtocolViolation(
                    "a state must be posted before a considering posting".to_string(),
                ),
            );
        }

        let update = state.update_delta(&state.updated, self.transport.new_timestamp());
        let considering = state.considering_delta(&proposed, self.transport.new_timestamp());

        if let Err(e) = self.post_delta(Phase::Update, &update).await {
            return self.report("post considering", &e);
        }
        match self.post_delta(Phase::Considering, &considering).await {
            Ok(()) => state.considered = proposed,
            Err(e) => self.report("post considering", &e),
        }
    }

    async fn post_delta(&self, phase: Phase, delta: &Delta) -> Result<(), BusError> {
        let payload = delta.encode()?;
        self.transport
            .post_payload(&self.topic(phase), payload, &delta.timestamp)
            .await
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Follow `agent_id`'s postings for this artefact.
    ///
    /// All three phases arrive through one subscription and are applied in
    /// bus order by a single worker, whichever callbacks are registered.
    /// Returns `None` (and reports) if the subscription fails.
    pub async fn listen(&self, agent_id: &str, listener: ArtefactListener) -> Option<ListenerHandle> {
        let topics: Vec<String> = Phase::ALL.iter().map(|phase| self.topic(*phase)).collect();
        let mut stream = match self.transport.listen(agent_id, &topics).await {
            Ok(stream) => stream,
            Err(e) => {
                self.report("listen", &e);
                return None;
            }
        };

        let connector = self.clone();
        let mut listener = listener;
        let task = tokio::spawn(async move {
            while let Some(posting) = stream.recv().await {
                connector.receive(&posting, &mut listener).await;
            }
        });

        debug!(artefact = %self.artefact_id, agent = agent_id, "Listening to artefact");
        Some(ListenerHandle::new(task))
    }

    /// Follow `agent_id`'s state postings only. Deltas are still applied so the
    /// state stays consistent, but do not call `handler`.
    pub async fn listen_to_state_postings(
        &self,
        agent_id: &str,
        handler: impl FnMut(&ArtefactState) + Send + 'static,
    ) -> Option<ListenerHandle> {
        self.listen(agent_id, ArtefactListener::new().on_state(handler))
            .await
    }

    /// Follow `agent_id`'s postings, calling `handler` after each applied update.
    pub async fn listen_to_update_postings(
        &self,
        agent_id: &str,
        handler: impl FnMut(&ArtefactState) + Send + 'static,
    ) -> Option<ListenerHandle> {
        self.listen(agent_id, ArtefactListener::new().on_update(handler))
            .await
    }

    /// Follow `agent_id`'s postings, calling `handler` after each applied
    /// considered change.
    pub async fn listen_to_considering_postings(
        &self,
        agent_id: &str,
        handler: impl FnMut(&ArtefactState) + Send + 'static,
    ) -> Option<ListenerHandle> {
        self.listen(agent_id, ArtefactListener::new().on_considering(handler))
            .await
    }

    async fn receive(&self, posting: &Posting, listener: &mut ArtefactListener) {
        let Some(phase) = Phase::of_topic(&posting.topic, &self.artefact_id, &self.json_version)
        else {
            debug!(topic = %posting.topic, "Posting for another artefact ignored");
            return;
        };

        let mut state = self.state.lock().await;
        let applied = match phase {
            Phase::State => state.apply_state(&posting.payload, &posting.timestamp),
            Phase::Update => state.apply_update(&posting.payload),
            Phase::Considering => state.apply_considering(&posting.payload),
        };

        match applied {
            Ok(()) => {
                debug!(artefact = %self.artefact_id, phase = %phase, timestamp = %posting.timestamp, "Posting applied");
                listener.notify(phase, &state);
            }
            Err(e) => self.report(&format!("receive {}", phase), &e),
        }
    }

    /// Adopt `agent_id`'s retained state posting, for agents that start
    /// following after the state was posted. Returns whether a state was
    /// adopted.
    pub async fn get_state(&self, agent_id: &str) -> bool {
        let posting = match self
            .transport
            .fetch_payload(agent_id, &self.topic(Phase::State))
            .await
        {
            Ok(Some(posting)) => posting,
            Ok(None) => return false,
            Err(e) => {
                self.report("get state", &e);
                return false;
            }
        };

        let mut state = self.state.lock().await;
        match state.apply_state(&posting.payload, &posting.timestamp) {
            Ok(()) => true,
            Err(e) => {
                self.report("get state", &e);
                false
            }
        }
    }
}

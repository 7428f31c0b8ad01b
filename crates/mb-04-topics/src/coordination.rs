//! Coordination messages: one streamed JSON value per coordination ID.

use crate::ensure_json;
use mb_02_transport::{ListenerHandle, ModellingBusConnector, Posting};
use shared_types::topics::coordination_topic;
use shared_types::BusError;

/// Coordination messages between agents. Failures are reported through the
/// transport's error sink rather than returned.
#[derive(Clone)]
pub struct Coordination {
    transport: ModellingBusConnector,
}

impl Coordination {
    /// Coordination namespace of `transport`'s agent.
    pub fn new(transport: ModellingBusConnector) -> Self {
        Self { transport }
    }

    fn settle<T>(&self, context: String, result: Result<T, BusError>) -> Option<T> {
        result
            .map_err(|e| self.transport.reporter().report(&context, &e))
            .ok()
    }

    /// Post `json` on `coordination_id`. The value always travels inline; text
    /// that is not JSON is reported and nothing is published.
    pub async fn post(&self, coordination_id: &str, json: Vec<u8>) {
        let topic = coordination_topic(coordination_id);
        if self.settle(format!("post {}", topic), ensure_json(&json)).is_none() {
            return;
        }
        let timestamp = self.transport.new_timestamp();
        let result = self.transport.post_streamed(&topic, json, &timestamp).await;
        self.settle(format!("post {}", topic), result);
    }

    /// Call `handler` with each coordination message `agent_id` posts on
    /// `coordination_id`. Returns `None` if the subscription failed.
    pub async fn listen(
        &self,
        agent_id: &str,
        coordination_id: &str,
        handler: impl FnMut(Posting) + Send + 'static,
    ) -> Option<ListenerHandle> {
        let topic = coordination_topic(coordination_id);
        let result = self
            .transport
            .listen_for_streamed(agent_id, &topic, handler)
            .await;
        self.settle(format!("listen {}/{}", agent_id, topic), result)
    }

    /// The latest message `agent_id` posted on `coordination_id`, if any.
    pub async fn get(&self, agent_id: &str, coordination_id: &str) -> Option<Posting> {
        let topic = coordination_topic(coordination_id);
        let result = self.transport.fetch_payload(agent_id, &topic).await;
        self.settle(format!("get {}/{}", agent_id, topic), result)
            .flatten()
    }

    /// Retract this agent's message on `coordination_id`.
    pub async fn delete(&self, coordination_id: &str) {
        let topic = coordination_topic(coordination_id);
        let result = self.transport.delete_posting(&topic).await;
        self.settle(format!("delete {}", topic), result);
    }
}

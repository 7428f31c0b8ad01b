//! Observations: raw files, JSON documents and streamed JSON values.

use crate::ensure_json;
use mb_02_transport::{FilePosting, ListenerHandle, ModellingBusConnector, Posting};
use shared_types::topics::{
    json_observations_topic, raw_observations_topic, streamed_observations_topic,
};
use shared_types::BusError;
use std::path::Path;
use tracing::debug;

/// Observations an agent shares with its peers. Failures are reported
/// through the transport's error sink rather than returned.
#[derive(Clone)]
pub struct Observations {
    transport: ModellingBusConnector,
}

impl Observations {
    /// Observations namespace of `transport`'s agent.
    pub fn new(transport: ModellingBusConnector) -> Self {
        Self { transport }
    }

    fn report(&self, context: &str, error: &BusError) {
        self.transport.reporter().report(context, error);
    }

    fn settle<T>(&self, context: &str, result: Result<T, BusError>) -> Option<T> {
        result.map_err(|e| self.report(context, &e)).ok()
    }

    // =========================================================================
    // Raw
    // =========================================================================

    /// Upload the file at `local_path` and post a pointer to it on
    /// `observation_id`. The local file is left in place.
    pub async fn post_raw(&self, observation_id: &str, local_path: &Path) {
        let topic = raw_observations_topic(observation_id);
        let timestamp = self.transport.new_timestamp();
        let result = self.transport.post_file(&topic, local_path, &timestamp).await;
        self.settle(&format!("post {}", topic), result);
    }

    /// `handler` receives the downloaded file and owns it.
    pub async fn listen_raw(
        &self,
        agent_id: &str,
        observation_id: &str,
        handler: impl FnMut(FilePosting) + Send + 'static,
    ) -> Option<ListenerHandle> {
        let topic = raw_observations_topic(observation_id);
        let result = self
            .transport
            .listen_for_files(agent_id, &topic, handler)
            .await;
        self.settle(&format!("listen {}/{}", agent_id, topic), result)
    }

    /// Download the latest raw observation `agent_id` posted, if any.
    pub async fn get_raw(&self, agent_id: &str, observation_id: &str) -> Option<FilePosting> {
        let topic = raw_observations_topic(observation_id);
        let result = self.transport.fetch_file(agent_id, &topic).await;
        self.settle(&format!("get {}/{}", agent_id, topic), result)
            .flatten()
    }

    /// Retract this agent's raw observation and remove its uploaded files.
    pub async fn delete_raw(&self, observation_id: &str) {
        self.delete(&raw_observations_topic(observation_id)).await;
    }

    // =========================================================================
    // JSON
    // =========================================================================

    /// Post a JSON document, inline or through the repository depending on its
    /// size. Text that is not JSON is reported and nothing is published.
    pub async fn post_json(&self, observation_id: &str, json: Vec<u8>) {
        let topic = json_observations_topic(observation_id);
        let context = format!("post {}", topic);
        if self.settle(&context, ensure_json(&json)).is_none() {
            return;
        }
        let timestamp = self.transport.new_timestamp();
        let result = self.transport.post_payload(&topic, json, &timestamp).await;
        self.settle(&context, result);
    }

    /// Call `handler` with each JSON observation `agent_id` posts on
    /// `observation_id`.
    pub async fn listen_json(
        &self,
        agent_id: &str,
        observation_id: &str,
        handler: impl FnMut(Posting) + Send + 'static,
    ) -> Option<ListenerHandle> {
        let topic = json_observations_topic(observation_id);
        let result = self
            .transport
            .listen_for_payloads(agent_id, &topic, handler)
            .await;
        self.settle(&format!("listen {}/{}", agent_id, topic), result)
    }

    /// The latest JSON observation `agent_id` posted, if any.
    pub async fn get_json(&self, agent_id: &str, observation_id: &str) -> Option<Posting> {
        self.get(agent_id, &json_observations_topic(observation_id))
            .await
    }

    /// Retract this agent's JSON observation.
    pub async fn delete_json(&self, observation_id: &str) {
        self.delete(&json_observations_topic(observation_id)).await;
    }

    // =========================================================================
    // Streamed
    // =========================================================================

    /// Post a JSON value inline whatever its size.
    pub async fn post_streamed(&self, observation_id: &str, json: Vec<u8>) {
        let topic = streamed_observations_topic(observation_id);
        let timestamp = self.transport.new_timestamp();
        let result = self.transport.post_streamed(&topic, json, &timestamp).await;
        self.settle(&format!("post {}", topic), result);
    }

    /// Call `handler` with each streamed value `agent_id` posts on
    /// `observation_id`.
    pub async fn listen_streamed(
        &self,
        agent_id: &str,
        observation_id: &str,
        handler: impl FnMut(Posting) + Send + 'static,
    ) -> Option<ListenerHandle> {
        let topic = streamed_observations_topic(observation_id);
        let result = self
            .transport
            .listen_for_streamed(agent_id, &topic, handler)
            .await;
        self.settle(&format!("listen {}/{}", agent_id, topic), result)
    }

    /// The latest streamed value `agent_id` posted, if any.
    pub async fn get_streamed(&self, agent_id: &str, observation_id: &str) -> Option<Posting> {
        self.get(agent_id, &streamed_observations_topic(observation_id))
            .await
    }

    /// Retract this agent's streamed observation.
    pub async fn delete_streamed(&self, observation_id: &str) {
        self.delete(&streamed_observations_topic(observation_id)).await;
    }

    // =========================================================================
    // Shared
    // =========================================================================

    async fn get(&self, agent_id: &str, topic: &str) -> Option<Posting> {
        let result = self.transport.fetch_payload(agent_id, topic).await;
        self.settle(&format!("get {}/{}", agent_id, topic), result)
            .flatten()
    }

    async fn delete(&self, topic: &str) {
        let result = self.transport.delete_posting(topic).await;
        if self.settle(&format!("delete {}", topic), result).is_some() {
            debug!(topic = topic, "Observation deleted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mb_01_repository::InMemoryRepository;
    use shared_bus::InMemoryEventBus;
    use shared_types::{BusConfig, ErrorLog, TopicBase};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const MAX_INLINE: usize = 128;

    struct Agent {
        observations: Observations,
        transport: ModellingBusConnector,
        errors: Arc<ErrorLog>,
        work: TempDir,
    }

    fn agent(bus: &Arc<InMemoryEventBus>, repo: &InMemoryRepository, id: &str) -> Agent {
        let work = TempDir::new().unwrap();
        let config = BusConfig {
            agent_id: id.to_string(),
            experiment_id: "exp".to_string(),
            work_directory: work.path().to_path_buf(),
            max_inline_payload: MAX_INLINE,
            ..BusConfig::default()
        };
        let errors = Arc::new(ErrorLog::new());
        let transport = ModellingBusConnector::new(
            &config,
            Arc::new(bus.connect(TopicBase::new("exp"), id)),
            Arc::new(repo.clone()),
            errors.clone(),
        );
        Agent {
            observations: Observations::new(transport.clone()),
            transport,
            errors,
            work,
        }
    }

    fn setup() -> (InMemoryRepository, Agent, Agent) {
        let bus = Arc::new(InMemoryEventBus::with_limits(64, MAX_INLINE));
        let repo = InMemoryRepository::new();
        let a = agent(&bus, &repo, "a1");
        let b = agent(&bus, &repo, "b1");
        (repo, a, b)
    }

    fn large_json() -> Vec<u8> {
        format!("[\"{}\"]", "o".repeat(MAX_INLINE * 8)).into_bytes()
    }

    #[tokio::test]
    async fn test_json_observation_listen_and_get() {
        let (repo, a, b) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = b
            .observations
            .listen_json("a1", "o1", move |posting| {
                let _ = tx.send(posting);
            })
            .await
            .unwrap();

        a.observations.post_json("o1", br#"{"temp":21}"#.to_vec()).await;

        let posting = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(posting.topic, "observations/json/o1");
        assert_eq!(posting.payload, br#"{"temp":21}"#);
        assert_eq!(repo.stats().connections, 0);

        let fetched = b.observations.get_json("a1", "o1").await.unwrap();
        assert_eq!(fetched.timestamp, posting.timestamp);
    }

    #[tokio::test]
    async fn test_large_json_observation_uses_repository() {
        let (repo, a, b) = setup();
        a.observations.post_json("o1", large_json()).await;

        let fetched = b.observations.get_json("a1", "o1").await.unwrap();
        assert_eq!(fetched.payload, large_json());
        assert_eq!(repo.stats().stores, 1);
        assert_eq!(repo.stats().retrieves, 1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_not_posted() {
        let (repo, a, b) = setup();
        a.observations.post_json("o1", b"{not json".to_vec()).await;

        assert!(a.errors.contains_kind("encoding"));
        assert!(b.observations.get_json("a1", "o1").await.is_none());
        assert_eq!(repo.stats().connections, 0);
    }

    #[tokio::test]
    async fn test_streamed_observation_stays_inline() {
        let (repo, a, b) = setup();
        a.observations.post_streamed("s1", large_json()).await;

        let fetched = b.observations.get_streamed("a1", "s1").await.unwrap();
        assert_eq!(fetched.payload, large_json());
        assert_eq!(repo.stats().connections, 0);
    }

    #[tokio::test]
    async fn test_raw_observation_round_trip() {
        let (_repo, a, b) = setup();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = b
            .observations
            .listen_raw("a1", "r1", move |posting| {
                let _ = tx.send(posting);
            })
            .await
            .unwrap();

        let source = a.work.path().join("trace.csv");
        std::fs::write(&source, "t,v\n0,1\n").unwrap();
        a.observations.post_raw("r1", &source).await;

        let posting = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(posting.path.starts_with(b.work.path()));
        assert_eq!(std::fs::read_to_string(&posting.path).unwrap(), "t,v\n0,1\n");

        let fetched = b.observations.get_raw("a1", "r1").await.unwrap();
        assert_eq!(std::fs::read_to_string(&fetched.path).unwrap(), "t,v\n0,1\n");
    }

    #[tokio::test]
    async fn test_missing_raw_file_is_reported() {
        let (repo, a, _b) = setup();
        a.observations
            .post_raw("r1", &a.work.path().join("absent.bin"))
            .await;
        assert!(a.errors.contains_kind("io"));
        assert_eq!(repo.stats().stores, 0);
    }

    #[tokio::test]
    async fn test_delete_removes_posting_and_blobs() {
        let (repo, a, b) = setup();
        a.observations.post_json("o1", large_json()).await;
        let endpoint = a.transport.repository().endpoint().clone();
        assert_eq!(repo.object_count(&endpoint), 1);

        a.observations.delete_json("o1").await;

        assert!(b.observations.get_json("a1", "o1").await.is_none());
        assert_eq!(repo.object_count(&endpoint), 0);
        assert!(a.errors.is_empty());
    }
}

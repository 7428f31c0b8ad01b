//! # Event Bus Connector
//!
//! The port the modelling bus consumes, and the in-process broker that
//! implements it.

use crate::events::{BusMessage, TopicFilter};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::config::DEFAULT_MAX_INLINE_PAYLOAD;
use shared_types::{BusConfig, BusError, TopicBase};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Publish/subscribe primitive used by the envelope transport.
///
/// Topic paths are relative (`coordination/turn`); implementations root them
/// under `<busVersion>/<experimentID>/<agentID>`. Publishing always uses the
/// connector's own agent ID; subscribing and fetching name the agent whose
/// postings are wanted.
#[async_trait]
pub trait EventBusConnector: Send + Sync {
    /// The agent this connector publishes as.
    fn agent_id(&self) -> &str;

    /// Publish `payload` on `topic_path`.
    async fn publish(&self, topic_path: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Subscribe to `agent_id`'s postings on every topic in `topic_paths`.
    ///
    /// One subscription delivers all of its topics in publish order.
    async fn subscribe(
        &self,
        agent_id: &str,
        topic_paths: &[String],
    ) -> Result<Subscription, BusError>;

    /// Fetch the latest (retained) posting of `agent_id` on `topic_path`.
    async fn fetch_one(
        &self,
        agent_id: &str,
        topic_path: &str,
    ) -> Result<Option<Vec<u8>>, BusError>;

    /// Delete this agent's retained posting on `topic_path`.
    async fn delete_topic(&self, topic_path: &str) -> Result<(), BusError>;

    /// Whether `payload` may travel inline in an event.
    fn payload_admissible(&self, payload: &[u8]) -> bool;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics
/// and keeps the last payload per topic for `fetch_one`. Suitable for a single
/// process; distributed deployments plug an MQTT-style broker in behind
/// [`EventBusConnector`].
pub struct InMemoryEventBus {
    /// Broadcast sender for messages.
    sender: broadcast::Sender<BusMessage>,

    /// Last payload per full topic.
    retained: RwLock<HashMap<String, Arc<[u8]>>>,

    /// Active subscription count by filter key.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Total messages published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,

    /// Admission threshold for inline payloads.
    max_inline_payload: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_INLINE_PAYLOAD)
    }

    /// Create a new in-memory event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_limits(capacity, DEFAULT_MAX_INLINE_PAYLOAD)
    }

    /// Create a bus with explicit capacity and inline payload threshold.
    #[must_use]
    pub fn with_limits(capacity: usize, max_inline_payload: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            retained: RwLock::new(HashMap::new()),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
            max_inline_payload,
        }
    }

    /// Create a bus sized by the bus configuration.
    #[must_use]
    pub fn from_config(config: &BusConfig) -> Self {
        Self::with_limits(config.channel_capacity, config.max_inline_payload)
    }

    /// Hand out a connector that publishes as `agent_id`.
    pub fn connect(self: &Arc<Self>, topic_base: TopicBase, agent_id: &str) -> AgentBusConnector {
        debug!(agent = agent_id, base = %topic_base, "Agent connected to bus");
        AgentBusConnector {
            bus: Arc::clone(self),
            topic_base,
            agent_id: agent_id.to_string(),
        }
    }

    /// Subscribe to messages matching a filter (full topics).
    #[must_use]
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        self.subscribe_rooted(filter, String::new())
    }

    fn subscribe_rooted(&self, filter: TopicFilter, root: String) -> Subscription {
        let receiver = self.sender.subscribe();
        debug!(topics = ?filter.topics, "New subscription created");
        Subscription::new(receiver, filter, root, self.subscriptions.clone())
    }

    /// Publish on a full topic, retaining the payload.
    ///
    /// Returns the number of subscribers that received the message.
    pub fn publish_raw(&self, topic: &str, payload: Vec<u8>) -> usize {
        let payload: Arc<[u8]> = payload.into();

        self.events_published.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut retained) = self.retained.write() {
            retained.insert(topic.to_string(), payload.clone());
        }

        let bytes = payload.len();
        match self.sender.send(BusMessage {
            topic: topic.to_string(),
            payload,
        }) {
            Ok(receiver_count) => {
                debug!(
                    topic = topic,
                    bytes = bytes,
                    receivers = receiver_count,
                    "Message published"
                );
                receiver_count
            }
            Err(e) => {
                // No receivers; the retained copy is still available to fetch
                debug!(topic = topic, error = %e, "Message retained without receivers");
                0
            }
        }
    }

    /// Latest payload retained on a full topic.
    #[must_use]
    pub fn retained(&self, topic: &str) -> Option<Arc<[u8]>> {
        self.retained
            .read()
            .ok()
            .and_then(|retained| retained.get(topic).cloned())
    }

    /// Forget the retained payload of a full topic.
    pub fn remove_retained(&self, topic: &str) -> bool {
        self.retained
            .write()
            .map(|mut retained| retained.remove(topic).is_some())
            .unwrap_or(false)
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Live subscriptions whose filter selects exactly the topics of `filter`.
    #[must_use]
    pub fn subscription_count(&self, filter: &TopicFilter) -> usize {
        self.subscriptions
            .read()
            .ok()
            .and_then(|subs| subs.get(&filter.key()).copied())
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admission threshold in bytes.
    #[must_use]
    pub fn max_inline_payload(&self) -> usize {
        self.max_inline_payload
    }

    /// Get the total number of messages published.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One agent's handle on an [`InMemoryEventBus`].
#[derive(Clone)]
pub struct AgentBusConnector {
    bus: Arc<InMemoryEventBus>,
    topic_base: TopicBase,
    agent_id: String,
}

impl AgentBusConnector {
    /// The shared broker behind this connector.
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    fn full_topic(&self, agent_id: &str, topic_path: &str) -> String {
        self.topic_base.agent_topic(agent_id, topic_path)
    }
}

#[async_trait]
impl EventBusConnector for AgentBusConnector {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    async fn publish(&self, topic_path: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let topic = self.full_topic(&self.agent_id, topic_path);
        self.bus.publish_raw(&topic, payload);
        Ok(())
    }

    async fn subscribe(
        &self,
        agent_id: &str,
        topic_paths: &[String],
    ) -> Result<Subscription, BusError> {
        if topic_paths.is_empty() {
            return Err(BusError::Publish {
                topic: self.full_topic(agent_id, ""),
                reason: "subscription needs at least one topic".to_string(),
            });
        }

        let topics = topic_paths
            .iter()
            .map(|path| self.full_topic(agent_id, path))
            .collect();
        let root = self.full_topic(agent_id, "");

        Ok(self
            .bus
            .subscribe_rooted(TopicFilter::topics(topics), root))
    }

    async fn fetch_one(
        &self,
        agent_id: &str,
        topic_path: &str,
    ) -> Result<Option<Vec<u8>>, BusError> {
        let topic = self.full_topic(agent_id, topic_path);
        Ok(self.bus.retained(&topic).map(|payload| payload.to_vec()))
    }

    async fn delete_topic(&self, topic_path: &str) -> Result<(), BusError> {
        let topic = self.full_topic(&self.agent_id, topic_path);
        if !self.bus.remove_retained(&topic) {
            warn!(topic = %topic, "Delete requested for topic without retained posting");
        }
        Ok(())
    }

    fn payload_admissible(&self, payload: &[u8]) -> bool {
        payload.len() <= self.bus.max_inline_payload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn agent(bus: &Arc<InMemoryEventBus>, id: &str) -> AgentBusConnector {
        bus.connect(TopicBase::new("exp"), id)
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryEventBus::new();
        let receivers = bus.publish_raw("t", b"{}".to_vec());
        assert_eq!(receivers, 0);
        assert_eq!(bus.events_published(), 1);
        assert!(bus.retained("t").is_some());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = InMemoryEventBus::new();

        let _sub1 = bus.subscribe(TopicFilter::all());
        let _sub2 = bus.subscribe(TopicFilter::all());
        let _sub3 = bus.subscribe(TopicFilter::topic("other"));

        let receivers = bus.publish_raw("t", b"{}".to_vec());

        assert_eq!(receivers, 3);
        assert_eq!(bus.subscriber_count(), 3);
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryEventBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.events_published(), 0);
        assert_eq!(bus.max_inline_payload(), DEFAULT_MAX_INLINE_PAYLOAD);
    }

    #[tokio::test]
    async fn test_agent_publish_reaches_other_agent() {
        let bus = Arc::new(InMemoryEventBus::new());
        let alice = agent(&bus, "alice");
        let bob = agent(&bus, "bob");

        let mut sub = bob
            .subscribe("alice", &["coordination/turn".to_string()])
            .await
            .unwrap();

        alice
            .publish("coordination/turn", b"{\"next\":\"bob\"}".to_vec())
            .await
            .unwrap();

        let message = timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.topic, "coordination/turn");
        assert_eq!(&*message.payload, b"{\"next\":\"bob\"}");
    }

    #[tokio::test]
    async fn test_subscription_scoped_to_agent() {
        let bus = Arc::new(InMemoryEventBus::new());
        let alice = agent(&bus, "alice");
        let carol = agent(&bus, "carol");

        let mut sub = alice
            .subscribe("bob", &["coordination/turn".to_string()])
            .await
            .unwrap();

        carol
            .publish("coordination/turn", b"1".to_vec())
            .await
            .unwrap();

        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_fetch_one_and_delete() {
        let bus = Arc::new(InMemoryEventBus::new());
        let alice = agent(&bus, "alice");
        let bob = agent(&bus, "bob");

        alice.publish("observations/json/o", b"1".to_vec()).await.unwrap();
        alice.publish("observations/json/o", b"2".to_vec()).await.unwrap();

        let fetched = bob.fetch_one("alice", "observations/json/o").await.unwrap();
        assert_eq!(fetched, Some(b"2".to_vec()));

        alice.delete_topic("observations/json/o").await.unwrap();
        let fetched = bob.fetch_one("alice", "observations/json/o").await.unwrap();
        assert_eq!(fetched, None);
    }

    #[tokio::test]
    async fn test_subscription_count_per_filter() {
        let bus = Arc::new(InMemoryEventBus::new());
        let alice = agent(&bus, "alice");
        let bob = agent(&bus, "bob");
        let turn = TopicFilter::topic("mbus-1/exp/alice/coordination/turn");

        let first = bob
            .subscribe("alice", &["coordination/turn".to_string()])
            .await
            .unwrap();
        let _second = alice
            .subscribe("alice", &["coordination/turn".to_string()])
            .await
            .unwrap();
        let _other = bob
            .subscribe("alice", &["coordination/other".to_string()])
            .await
            .unwrap();
        assert_eq!(bus.subscription_count(&turn), 2);

        drop(first);
        assert_eq!(bus.subscription_count(&turn), 1);
        assert_eq!(bus.subscription_count(&TopicFilter::all()), 0);
    }

    #[tokio::test]
    async fn test_subscribe_requires_topics() {
        let bus = Arc::new(InMemoryEventBus::new());
        let alice = agent(&bus, "alice");
        assert!(alice.subscribe("bob", &[]).await.is_err());
    }

    #[test]
    fn test_payload_admission() {
        let bus = Arc::new(InMemoryEventBus::with_limits(16, 8));
        let alice = agent(&bus, "alice");
        assert!(alice.payload_admissible(b"12345678"));
        assert!(!alice.payload_admissible(b"123456789"));
    }
}

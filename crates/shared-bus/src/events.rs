//! # Bus Messages
//!
//! Messages carried by the bus and the filters subscriptions use to select them.

use std::sync::Arc;

/// A message on the bus: full topic plus opaque payload bytes.
///
/// The payload is shared so that broadcasting to many subscribers does not
/// copy it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw payload (an encoded envelope, as far as the modelling bus is concerned).
    pub payload: Arc<[u8]>,
}

impl BusMessage {
    /// Message on `topic` carrying `payload`.
    pub fn new(topic: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicFilter {
    /// Full topics to include. Empty means all topics.
    pub topics: Vec<String>,
}

impl TopicFilter {
    /// Create a filter that accepts all messages.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for a single topic.
    #[must_use]
    pub fn topic(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
        }
    }

    /// Create a filter for several topics.
    #[must_use]
    pub fn topics(topics: Vec<String>) -> Self {
        Self { topics }
    }

    /// Check if a message matches this filter.
    #[must_use]
    pub fn matches(&self, message: &BusMessage) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| *t == message.topic)
    }

    /// Stable key used for subscription bookkeeping.
    pub(crate) fn key(&self) -> String {
        if self.topics.is_empty() {
            "*".to_string()
        } else {
            self.topics.join(",")
        }
    }
}

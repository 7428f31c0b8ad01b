//! # Subscriptions
//!
//! The receiving side of the event bus.

use crate::events::{BusMessage, TopicFilter};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// A subscription handle for receiving messages.
///
/// Messages are delivered in publish order. Topics of delivered messages are
/// relative to the subscription root (the publishing agent's topic root), so
/// callers see the same topic paths they subscribed to.
///
/// When dropped, the subscription is automatically cleaned up.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<BusMessage>,

    /// Filter for this subscription (full topics).
    filter: TopicFilter,

    /// Prefix stripped from delivered topics.
    root: String,

    /// Reference to subscription tracking (for cleanup).
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,

    /// Key for this subscription in the tracking map.
    topic_key: String,
}

impl Subscription {
    /// Create a new subscription.
    ///
    /// Adapters for external brokers build subscriptions by feeding a
    /// broadcast channel of their own.
    pub fn new(
        receiver: broadcast::Receiver<BusMessage>,
        filter: TopicFilter,
        root: String,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    ) -> Self {
        let topic_key = filter.key();
        if let Ok(mut subs) = subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }

        Self {
            receiver,
            filter,
            root,
            subscriptions,
            topic_key,
        }
    }

    /// Receive the next message that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next matching message
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            let message = match self.receiver.recv().await {
                Ok(m) => m,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some messages dropped");
                    continue;
                }
            };

            if self.filter.matches(&message) {
                return Some(self.relativize(message));
            }
        }
    }

    /// Try to receive the next message without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))` - A message was available and matched
    /// - `Ok(None)` - No message available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<BusMessage>, SubscriptionError> {
        loop {
            let message = match self.receiver.try_recv() {
                Ok(m) => m,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&message) {
                return Ok(Some(self.relativize(message)));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    fn relativize(&self, message: BusMessage) -> BusMessage {
        match message.topic.strip_prefix(&self.root) {
            Some(relative) if !self.root.is_empty() => BusMessage {
                topic: relative.to_string(),
                payload: message.payload,
            },
            _ => message,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        let Some(count) = subs.get_mut(&self.topic_key) else {
            debug!(topic = %self.topic_key, "Subscription dropped");
            return;
        };

        *count = count.saturating_sub(1);
        if *count == 0 {
            subs.remove(&self.topic_key);
        }
        debug!(topic = %self.topic_key, "Subscription dropped");
    }
}

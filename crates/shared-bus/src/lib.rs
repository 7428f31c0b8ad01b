//! # Shared Bus - Event Bus Connector
//!
//! The publish/subscribe primitive underneath the modelling bus.
//!
//! ## Port
//!
//! [`EventBusConnector`] is the interface the envelope transport consumes:
//! topic-scoped publish, topic-scoped subscribe, single-message fetch, topic
//! delete, and the payload admission check that decides inline transport.
//! Topic paths handed to the port are relative; the connector roots them under
//! `<busVersion>/<experimentID>/<agentID>`.
//!
//! ## In-process broker
//!
//! ```text
//! ┌──────────────┐                       ┌──────────────┐
//! │   Agent A    │   publish(topic)      │   Agent B    │
//! │ (connector)  │ ───────┐              │ (connector)  │
//! └──────────────┘        │              └──────────────┘
//!                         ▼                      ↑
//!                  ┌──────────────┐              │
//!                  │InMemoryEventBus│ ───────────┘
//!                  │  + retained  │  subscribe(A, topics)
//!                  └──────────────┘
//! ```
//!
//! [`InMemoryEventBus`] keeps the last message per topic (retained) so that
//! `fetch_one` behaves like a retained-message broker. Delivery is at-most-once:
//! a lagging subscriber skips what it missed.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{BusMessage, TopicFilter};
pub use publisher::{AgentBusConnector, EventBusConnector, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum messages to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = shared_types::config::DEFAULT_CHANNEL_CAPACITY;

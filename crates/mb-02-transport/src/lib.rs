//! # MB-02 Transport
//!
//! Envelope transport for the modelling bus. Every posting travels in an
//! [`Envelope`] that carries a timestamp and either the payload itself or a
//! pointer to a blob in the posting agent's repository.
//!
//! ## Transport decision
//!
//! | Posting kind | Inline | Blob |
//! |--------------|--------|------|
//! | JSON payload | if the bus admits it | otherwise |
//! | Streamed JSON | always | never |
//! | Raw file | never | always |
//!
//! Receivers resolve either form transparently; temporary local copies of
//! downloaded payloads are removed once read.
//!
//! ## Listening
//!
//! [`ModellingBusConnector::listen`] turns one bus subscription into a
//! [`PostingStream`] fed by a single decoding task, so postings arrive in bus
//! order. Messages that fail to decode or resolve are reported and dropped.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod envelope;
pub mod listener;
pub mod metrics;
pub mod service;

pub use envelope::{Envelope, EnvelopeBody};
pub use listener::{DeliveryStream, FilePosting, FileStream, ListenerHandle, Posting, PostingStream};
pub use metrics::{TransportMetrics, TransportMetricsSnapshot};
pub use service::ModellingBusConnector;

//! # MB-03 Artefacts
//!
//! Keeps a JSON artefact synchronized between agents.
//!
//! ## Protocol
//!
//! Each artefact has three sub-topics below
//! `artefacts/file/<artefactID>/<jsonVersion>`:
//!
//! | Phase | Carries | Receiver effect |
//! |-------|---------|-----------------|
//! | `state` | full content | current = updated = considered = content |
//! | `update` | delta current → updated | updated = considered = patch(current) |
//! | `considering` | delta updated → considered | considered = patch(updated) |
//!
//! Deltas name the state they are relative to. A receiver whose last state
//! differs rejects the delta with an out-of-order error and keeps its
//! content, so a missed or late state posting never corrupts the copy.
//!
//! ## Concurrency
//!
//! Every post and every received posting for one artefact runs under that
//! artefact's lock. A listener uses one subscription for all three phases
//! and applies postings serially in bus order.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod listener;
pub mod service;

pub use domain::{ArtefactState, Delta};
pub use listener::{ArtefactListener, Phase};
pub use service::ArtefactConnector;

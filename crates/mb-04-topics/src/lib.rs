//! # MB-04 Topics
//!
//! One-shot message kinds on top of the envelope transport. No protocol
//! state is kept; each namespace only picks the topic and the transport
//! mode.
//!
//! | Namespace | Topic | Mode |
//! |-----------|-------|------|
//! | raw observation | `observations/raw/<id>` | file, always through the repository |
//! | JSON observation | `observations/json/<id>` | inline if admitted, else repository |
//! | streamed observation | `observations/streamed/<id>` | always inline |
//! | coordination | `coordination/<id>` | always inline |
//!
//! Every operation reports failures through the transport's error sink.

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod coordination;
pub mod observations;

pub use coordination::Coordination;
pub use observations::Observations;

use serde::de::IgnoredAny;
use shared_types::BusError;

/// Reject payloads that are not a single JSON value.
pub(crate) fn ensure_json(payload: &[u8]) -> Result<(), BusError> {
    serde_json::from_slice::<IgnoredAny>(payload)
        .map(|_| ())
        .map_err(BusError::encoding)
}

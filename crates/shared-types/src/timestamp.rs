//! # Timestamps
//!
//! Timestamps name blobs, tag envelopes and identify artefact states.
//!
//! ## Contract
//!
//! Every value is fixed-width and zero-padded, and successive values from one
//! source sort strictly increasing as plain strings. Retention cleanup compares
//! blob names lexicographically and depends on this.
//!
//! Format: `YYYY-MM-DD-hh-mm-ss-ffffff-NNNN` (UTC, microseconds, then a counter
//! that separates values taken within the same microsecond).

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

const CLOCK_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%6f";
const MAX_COUNTER: u32 = 9999;

/// Source of lexicographically monotonic timestamps.
pub trait TimestampSource: Send + Sync {
    /// Produce the next timestamp.
    fn next_timestamp(&self) -> String;
}

#[derive(Debug)]
struct ClockState {
    last: Option<DateTime<Utc>>,
    counter: u32,
}

/// Wall-clock timestamp source.
///
/// Equal clock readings and clock regressions are absorbed by the counter, so
/// the output never goes backwards even if the system clock does.
#[derive(Debug)]
pub struct SystemTimestamps {
    state: Mutex<ClockState>,
}

impl SystemTimestamps {
    /// Source that has produced nothing yet.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                last: None,
                counter: 0,
            }),
        }
    }

    fn next_at(&self, now: DateTime<Utc>) -> String {
        let mut state = self.state.lock();
        let now = truncate_to_micros(now);

        let (instant, counter) = match state.last {
            Some(last) if now <= last => {
                if state.counter >= MAX_COUNTER {
                    (last + Duration::microseconds(1), 0)
                } else {
                    (last, state.counter + 1)
                }
            }
            _ => (now, 0),
        };

        state.last = Some(instant);
        state.counter = counter;

        format!("{}-{:04}", instant.format(CLOCK_FORMAT), counter)
    }
}

impl Default for SystemTimestamps {
    fn default() -> Self {
        Self::new()
    }
}

impl TimestampSource for SystemTimestamps {
    fn next_timestamp(&self) -> String {
        self.next_at(Utc::now())
    }
}

fn truncate_to_micros(instant: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = instant.timestamp_subsec_nanos();
    instant - Duration::nanoseconds(i64::from(nanos % 1_000))
}

//! # Modelling Bus Telemetry
//!
//! Structured logging for agents on the modelling bus.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mb_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() {
//!     let config = TelemetryConfig::from_env();
//!     init_logging(&config).expect("Failed to init logging");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MB_SERVICE_NAME` | `modelling-bus` | Service name attached to log lines |
//! | `MB_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `MB_JSON_LOGS` | `false` | Emit JSON formatted logs |

#![warn(missing_docs)]
#![warn(clippy::all)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The configured filter directive does not parse.
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// Logging was set up earlier in this process.
    #[error("A global subscriber is already installed")]
    AlreadyInitialised,
}

//! Structured logging setup.
//!
//! Log lines carry consistent fields:
//! - `service`: service name from the configuration
//! - `topic`, `artefact_id`, `agent`: added by the bus components
//! - `kind`: error kind for reported errors

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Returns [`TelemetryError::AlreadyInitialised`] if a subscriber is already
/// installed (e.g. a second call, or a test harness that set one up).
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_new(&config.log_level).map_err(|e| TelemetryError::InvalidFilter {
            filter: config.log_level.clone(),
            reason: e.to_string(),
        })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|_| TelemetryError::AlreadyInitialised)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Logging initialised"
    );
    Ok(())
}

//! # Bus Configuration
//!
//! Configuration consumed by the connectors. Loading it from a file is up to
//! the host process; `BusConfig` deserializes from any serde format and can be
//! read from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `MB_AGENT_ID` | `agent` |
//! | `MB_EXPERIMENT_ID` | `experiment` |
//! | `MB_WORK_DIR` | system temp dir |
//! | `MB_REPOSITORY_SERVER` | `localhost` |
//! | `MB_REPOSITORY_PORT` | `21` |
//! | `MB_REPOSITORY_USER` | empty |
//! | `MB_REPOSITORY_PASSWORD` | empty |
//! | `MB_REPOSITORY_PREFIX` | empty |
//! | `MB_MAX_INLINE_PAYLOAD` | `262144` |
//! | `MB_CHANNEL_CAPACITY` | `1000` |

use crate::topics::TopicBase;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Default admission threshold for inline payloads (256 KiB).
pub const DEFAULT_MAX_INLINE_PAYLOAD: usize = 256 * 1024;

/// Default capacity of bus channels and listener queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required identifier is empty.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// An identifier would add a level to the topic path.
    #[error("{field} must not contain '/': {value}")]
    InvalidSegment { field: &'static str, value: String },

    /// `max_inline_payload` is zero.
    #[error("max_inline_payload must be greater than zero")]
    ZeroInlinePayload,

    /// `channel_capacity` is zero.
    #[error("channel_capacity must be greater than zero")]
    ZeroChannelCapacity,
}

/// Complete connector configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Identity of this agent; roots its own topics.
    pub agent_id: String,
    /// Experiment all cooperating agents belong to.
    pub experiment_id: String,
    /// Local scratch directory for temporary files and downloads.
    pub work_directory: PathBuf,
    /// Blob store settings.
    pub repository: RepositoryConfig,
    /// Largest payload (bytes) that may travel inline in an event.
    pub max_inline_payload: usize,
    /// Capacity of bus channels and listener queues.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            agent_id: "agent".to_string(),
            experiment_id: "experiment".to_string(),
            work_directory: std::env::temp_dir(),
            repository: RepositoryConfig::default(),
            max_inline_payload: DEFAULT_MAX_INLINE_PAYLOAD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Blob store (repository) settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Host of the agent's own repository.
    pub server: String,
    /// Repository port.
    pub port: u16,
    /// Login name. Empty means anonymous access.
    pub user: String,
    /// Password for `user`.
    pub password: String,
    /// Path prefix placed before the topic base.
    pub prefix: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 21,
            user: String::new(),
            password: String::new(),
            prefix: String::new(),
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup (same keys as the
    /// environment variables).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let repo_defaults = RepositoryConfig::default();

        Self {
            agent_id: lookup("MB_AGENT_ID").unwrap_or(defaults.agent_id),
            experiment_id: lookup("MB_EXPERIMENT_ID").unwrap_or(defaults.experiment_id),
            work_directory: lookup("MB_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_directory),
            repository: RepositoryConfig {
                server: lookup("MB_REPOSITORY_SERVER").unwrap_or(repo_defaults.server),
                port: lookup("MB_REPOSITORY_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(repo_defaults.port),
                user: lookup("MB_REPOSITORY_USER").unwrap_or(repo_defaults.user),
                password: lookup("MB_REPOSITORY_PASSWORD").unwrap_or(repo_defaults.password),
                prefix: lookup("MB_REPOSITORY_PREFIX").unwrap_or(repo_defaults.prefix),
            },
            max_inline_payload: lookup("MB_MAX_INLINE_PAYLOAD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_inline_payload),
            channel_capacity: lookup("MB_CHANNEL_CAPACITY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.channel_capacity),
        }
    }

    /// Check the configuration before creating connectors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_segment("agent_id", &self.agent_id)?;
        validate_segment("experiment_id", &self.experiment_id)?;
        if self.max_inline_payload == 0 {
            return Err(ConfigError::ZeroInlinePayload);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(())
    }

    /// `<busVersion>/<experimentID>`
    pub fn topic_base(&self) -> TopicBase {
        TopicBase::new(&self.experiment_id)
    }

    /// Repository directory holding this agent's blobs.
    pub fn repository_root(&self) -> String {
        self.topic_base()
            .repository_root(&self.repository.prefix, &self.agent_id)
    }
}

fn validate_segment(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Empty { field });
    }
    if value.contains('/') {
        return Err(ConfigError::InvalidSegment {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

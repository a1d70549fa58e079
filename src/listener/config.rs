//! Listener configuration
//!
//! Loaded from YAML. Every field is optional:
//!
//! ```yaml
//! max_in_flight: 64
//! backpressure: reject     # or: queue
//! task_timeout_ms: 5000
//! malformed_markers: ["<ModelCom"]
//! ```

use crate::event::MODEL_DUMP_MARKER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What `on_message` does when `max_in_flight` tasks are already admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Submit anyway; the task waits inside the pool for a free slot.
    ///
    /// Only concurrency is bounded. Each waiting task keeps its payload, so
    /// memory grows with the backlog; use `Reject` to bound it.
    #[default]
    Queue,
    /// Fail the ingress call with `IngestError::Overloaded`.
    Reject,
}

/// Configuration for a [`super::Listener`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    /// Maximum number of tasks decoding or handling at once (unbounded if unset)
    pub max_in_flight: Option<usize>,
    /// Policy once `max_in_flight` is reached
    pub backpressure: BackpressurePolicy,
    /// Per-task limit covering decode and handler, in milliseconds
    pub task_timeout_ms: Option<u64>,
    /// Payload prefixes rejected as malformed before parsing
    pub malformed_markers: Vec<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_in_flight: None,
            backpressure: BackpressurePolicy::Queue,
            task_timeout_ms: None,
            malformed_markers: vec![MODEL_DUMP_MARKER.to_string()],
        }
    }
}

impl ListenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    pub fn with_backpressure(mut self, policy: BackpressurePolicy) -> Self {
        self.backpressure = policy;
        self
    }

    /// Set the per-task timeout, rounded up to whole milliseconds (at least 1).
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        let partial = u128::from(timeout.subsec_nanos() % 1_000_000 != 0);
        let millis = u64::try_from(timeout.as_millis() + partial).unwrap_or(u64::MAX);
        self.task_timeout_ms = Some(millis.max(1));
        self
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_ms.map(Duration::from_millis)
    }

    /// Parse and validate a YAML document. An empty document yields defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid("max_in_flight must be at least 1".into()));
        }
        if self.task_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("task_timeout_ms must be at least 1".into()));
        }
        if self.malformed_markers.iter().any(|m| m.is_empty()) {
            return Err(ConfigError::Invalid(
                "malformed_markers must not contain empty strings".into(),
            ));
        }
        Ok(())
    }
}

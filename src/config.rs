//! Repository configuration

use std::time::Duration;

#[cfg(feature = "serde_support")]
use serde::{Deserialize, Serialize};

/// Default repository name used in log events
pub const DEFAULT_REPOSITORY_NAME: &str = "repository";

/// Settings shared by the synchronous and asynchronous repositories
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde_support", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde_support", serde(default))]
pub struct RepositoryConfig {
    /// Name attached to every log event the repository emits
    pub name: String,
    /// Deadline for a single asynchronous operation, in milliseconds.
    /// `None` disables the deadline. Ignored by the synchronous repository.
    pub operation_timeout_ms: Option<u64>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_REPOSITORY_NAME.to_string(),
            operation_timeout_ms: None,
        }
    }
}

impl RepositoryConfig {
    /// Create a config with the given name and no deadline
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the per-operation deadline
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Per-operation deadline, if any
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    #[cfg(feature = "serde_support")]
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Configuration {
            message: format!("Invalid repository config: {}", e),
        })
    }
}

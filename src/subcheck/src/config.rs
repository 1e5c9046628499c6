//! Live configuration for the subject check
//!
//! The engine reads a fresh [`SubCheckConfig`] from its [`ConfigProvider`] on
//! every decision, so operators can flip the bypass flags or swap the
//! verifier endpoint without restarting the process.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Result, SubCheckError};

/// Environment variable holding the verifier endpoint URL
pub const ENV_SUB_CHECK_URL: &str = "SUB_CHECK_URL";

/// Environment variable enabling the GET bypass
pub const ENV_ALLOW_READS: &str = "ALLOW_READS";

/// Environment variable enabling the DELETE bypass
pub const ENV_ALLOW_DELETES: &str = "ALLOW_DELETES";

/// Subject-check configuration snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubCheckConfig {
    /// Verifier endpoint; `None` disables the external check
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Skip the check for GET requests
    #[serde(default)]
    pub allow_reads: bool,

    /// Skip the check for DELETE requests
    #[serde(default)]
    pub allow_deletes: bool,
}

impl SubCheckConfig {
    /// Create a configuration pointing at the given verifier endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// The endpoint, if one is set and not blank
    pub fn active_endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Whether the external check is switched on at all
    pub fn is_check_enabled(&self) -> bool {
        self.active_endpoint().is_some()
    }

    /// Load configuration from `SUB_CHECK_URL`, `ALLOW_READS` and `ALLOW_DELETES`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = lookup(ENV_SUB_CHECK_URL).filter(|e| !e.trim().is_empty());
        let allow_reads = match lookup(ENV_ALLOW_READS) {
            Some(raw) => parse_flag(ENV_ALLOW_READS, &raw)?,
            None => false,
        };
        let allow_deletes = match lookup(ENV_ALLOW_DELETES) {
            Some(raw) => parse_flag(ENV_ALLOW_DELETES, &raw)?,
            None => false,
        };

        Ok(Self {
            endpoint,
            allow_reads,
            allow_deletes,
        })
    }
}

/// Parse an operator-supplied boolean flag
pub fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(SubCheckError::InvalidConfig(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

/// Source of the configuration consulted on each decision
pub trait ConfigProvider: Send + Sync {
    /// Current configuration
    fn snapshot(&self) -> SubCheckConfig;
}

impl ConfigProvider for SubCheckConfig {
    fn snapshot(&self) -> SubCheckConfig {
        self.clone()
    }
}

/// Runtime-mutable configuration shared between the engine and operators
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<SubCheckConfig>>,
}

impl SharedConfig {
    /// Wrap an initial configuration
    pub fn new(config: SubCheckConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Point the check at a verifier endpoint
    pub fn set_endpoint(&self, endpoint: impl Into<String>) {
        self.inner.write().endpoint = Some(endpoint.into());
    }

    /// Disable the external check
    pub fn clear_endpoint(&self) {
        self.inner.write().endpoint = None;
    }

    pub fn set_allow_reads(&self, allow: bool) {
        self.inner.write().allow_reads = allow;
    }

    pub fn set_allow_deletes(&self, allow: bool) {
        self.inner.write().allow_deletes = allow;
    }

    /// Replace the whole configuration at once
    pub fn replace(&self, config: SubCheckConfig) {
        *self.inner.write() = config;
    }
}

impl ConfigProvider for SharedConfig {
    fn snapshot(&self) -> SubCheckConfig {
        self.inner.read().clone()
    }
}

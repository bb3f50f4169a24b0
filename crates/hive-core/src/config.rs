//! Console configuration: the clusters this console can reach.
//!
//! ```toml
//! [[clusters]]
//! code = "prod"
//! name = "Production"
//! endpoint = "https://10.0.0.1:8443/"
//! token = "shared-secret"
//! ips = ["10.0.0.1", "10.0.0.2"]
//! trust_cluster_certs = true
//! timeout = "15s"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Per-call timeout used when a cluster entry does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown cluster code: {0}")]
    UnknownCluster(String),
    #[error("duplicate cluster code: {0}")]
    DuplicateCluster(String),
    #[error("cluster `{0}` has no endpoint")]
    MissingEndpoint(String),
    #[error("cluster `{0}` has no token")]
    MissingToken(String),
    #[error("cluster `{code}` has an invalid timeout: {value}")]
    InvalidTimeout { code: String, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

/// A remote cluster reachable through one signed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    pub code: String,
    pub name: Option<String>,
    /// Base URL of the cluster's admin API.
    pub endpoint: String,
    /// Shared secret used to sign requests.
    pub token: String,
    /// Addresses of every node expected in the cluster.
    #[serde(default)]
    pub ips: Vec<String>,
    /// Accept self-signed certificates from cluster nodes. This turns off
    /// TLS verification for the cluster endpoint.
    #[serde(default = "default_trust")]
    pub trust_cluster_certs: bool,
    /// Per-call timeout, e.g. "15s", "500ms", "1m".
    pub timeout: Option<String>,
}

fn default_trust() -> bool {
    true
}

impl ConsoleConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), clusters = config.clusters.len(), "loaded console config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ConsoleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check codes are unique and every entry can sign requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for cluster in &self.clusters {
            if !seen.insert(cluster.code.as_str()) {
                return Err(ConfigError::DuplicateCluster(cluster.code.clone()));
            }
            if cluster.endpoint.trim().is_empty() {
                return Err(ConfigError::MissingEndpoint(cluster.code.clone()));
            }
            if cluster.token.is_empty() {
                return Err(ConfigError::MissingToken(cluster.code.clone()));
            }
            cluster.timeout()?;
        }
        Ok(())
    }

    /// Look up a cluster by its code.
    pub fn cluster(&self, code: &str) -> Result<&ClusterConfig, ConfigError> {
        self.clusters
            .iter()
            .find(|c| c.code == code)
            .ok_or_else(|| ConfigError::UnknownCluster(code.to_string()))
    }
}

impl ClusterConfig {
    pub fn new(code: &str, endpoint: &str, token: &str, ips: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            name: None,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
            ips,
            trust_cluster_certs: true,
            timeout: None,
        }
    }

    /// Resolved per-call timeout.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        match &self.timeout {
            None => Ok(DEFAULT_TIMEOUT),
            Some(value) => parse_duration(value).ok_or_else(|| ConfigError::InvalidTimeout {
                code: self.code.clone(),
                value: value.clone(),
            }),
        }
    }
}

/// Parse a duration string like "5s", "500ms", "1m". Plain numbers are seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

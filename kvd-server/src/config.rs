//! Node configuration file.
//!
//! A node is described by a small JSON document:
//!
//! ```text
//! {
//!   "name": "node-1",
//!   "id": 1,
//!   "host": "127.0.0.1",
//!   "port": 3000,
//!   "raft_port": 3001,
//!   "bootstrap": true
//! }
//! ```
//!
//! A second node names an existing member's HTTP address in `join_addr`
//! instead of setting `bootstrap`.

use kvd_cluster::ClusterConfig;
use kvd_cluster::config::RaftConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading a node configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid configuration document.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field is missing or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration of one kvd process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name, used for the data directory and log context.
    #[serde(default)]
    pub name: String,

    /// Raft node id, unique in the cluster.
    #[serde(default)]
    pub id: u64,

    /// Host both listeners bind to and advertise.
    #[serde(default)]
    pub host: String,

    /// HTTP gateway port.
    #[serde(default)]
    pub port: u16,

    /// Raft transport port.
    #[serde(default)]
    pub raft_port: u16,

    /// Create a new single-member cluster on start.
    #[serde(default)]
    pub bootstrap: bool,

    /// HTTP address of an existing member to join through.
    #[serde(default)]
    pub join_addr: Option<String>,

    /// Root data directory. Each node keeps its files in `<data_dir>/<name>`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format override ("json", "pretty" or "compact").
    #[serde(default)]
    pub log_format: Option<String>,

    /// Log filter override (e.g. "info,openraft=warn").
    #[serde(default)]
    pub log_level: Option<String>,

    /// Raft timing.
    #[serde(default)]
    pub raft: RaftConfig,

    /// Log entries between snapshots.
    #[serde(default)]
    pub snapshot_threshold: Option<u64>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl NodeConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and their combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("name is required".to_string()));
        }
        if self.id == 0 {
            return Err(ConfigError::Invalid("id must be > 0".to_string()));
        }
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host is required".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port is required".to_string()));
        }
        if self.raft_port == 0 {
            return Err(ConfigError::Invalid("raft_port is required".to_string()));
        }
        if self.port == self.raft_port {
            return Err(ConfigError::Invalid(
                "port and raft_port must differ".to_string(),
            ));
        }
        if self.bootstrap && self.join_target().is_some() {
            return Err(ConfigError::Invalid(
                "bootstrap and join_addr cannot be set at the same time".to_string(),
            ));
        }
        Ok(())
    }

    /// The join target, if one is configured.
    pub fn join_target(&self) -> Option<&str> {
        self.join_addr.as_deref().filter(|addr| !addr.is_empty())
    }

    /// Address of the HTTP gateway.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address of the Raft transport.
    pub fn raft_addr(&self) -> String {
        format!("{}:{}", self.host, self.raft_port)
    }

    /// Directory holding this node's log, stable store and snapshot.
    pub fn node_dir(&self) -> PathBuf {
        self.data_dir.join(&self.name)
    }

    /// Cluster settings derived from this file.
    pub fn cluster_config(&self) -> Result<ClusterConfig, ConfigError> {
        let (min, max) = self.raft.election_timeout_ms;
        let mut builder = ClusterConfig::builder()
            .node_id(self.id)
            .listen_addr(self.raft_addr())
            .data_dir(self.node_dir())
            .election_timeout_ms(min, max)
            .heartbeat_interval_ms(self.raft.heartbeat_interval_ms);
        if let Some(threshold) = self.snapshot_threshold {
            builder = builder.snapshot_threshold(threshold);
        }

        let mut config = builder.build().map_err(ConfigError::Invalid)?;
        config.raft.max_entries_per_append = self.raft.max_entries_per_append;
        Ok(config)
    }
}

//! Cluster node configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a cluster node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// This node's unique ID in the cluster (1-based).
    pub node_id: u64,

    /// Address the Raft gRPC server listens on (e.g., "0.0.0.0:5001").
    pub listen_addr: String,

    /// Raft address advertised to other nodes. Defaults to `listen_addr`.
    pub advertise_addr: Option<String>,

    /// Node-private directory for the log store, stable store and snapshots.
    pub data_dir: PathBuf,

    /// Raft timing configuration.
    pub raft: RaftConfig,

    /// Snapshot configuration.
    pub snapshot: SnapshotConfig,

    /// Deadlines for engine calls.
    pub timeouts: TimeoutConfig,

    /// Join retry policy.
    pub join: JoinConfig,
}

/// Raft timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaftConfig {
    /// Election timeout range (min, max) in milliseconds.
    pub election_timeout_ms: (u64, u64),

    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Maximum entries per AppendEntries RPC.
    pub max_entries_per_append: u64,
}

/// Snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Build a snapshot after this many log entries since the last one.
    pub snapshot_threshold: u64,
}

/// Deadlines for bounded engine calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long a proposed command may wait for commit and apply.
    pub propose_ms: u64,

    /// How long admitting a new voter may take.
    pub admit_ms: u64,
}

/// Join retry policy for a node started with a join target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Maximum number of join attempts before giving up.
    pub max_attempts: u32,

    /// Pause between attempts in milliseconds.
    pub backoff_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            listen_addr: "127.0.0.1:5001".to_string(),
            advertise_addr: None,
            data_dir: PathBuf::from("./data/node-1"),
            raft: RaftConfig::default(),
            snapshot: SnapshotConfig::default(),
            timeouts: TimeoutConfig::default(),
            join: JoinConfig::default(),
        }
    }
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_ms: (150, 300),
            heartbeat_interval_ms: 50,
            max_entries_per_append: 100,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: 10_000,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            propose_ms: 10_000,
            admit_ms: 10_000,
        }
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_ms: 5_000,
        }
    }
}

impl JoinConfig {
    /// Pause between attempts.
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl ClusterConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClusterConfigBuilder {
        ClusterConfigBuilder::default()
    }

    /// Get the advertised address (falls back to listen_addr).
    pub fn advertise_addr(&self) -> &str {
        self.advertise_addr.as_deref().unwrap_or(&self.listen_addr)
    }

    /// Deadline for a proposed command.
    pub fn propose_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.propose_ms)
    }

    /// Deadline for admitting a voter.
    pub fn admit_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.admit_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_id == 0 {
            return Err("node_id must be > 0".to_string());
        }

        if self.listen_addr.is_empty() {
            return Err("listen_addr is required".to_string());
        }

        let (min_election, max_election) = self.raft.election_timeout_ms;
        if min_election >= max_election {
            return Err(format!(
                "election_timeout_ms min ({}) must be below max ({})",
                min_election, max_election
            ));
        }

        // Heartbeat must be well below the election timeout.
        if self.raft.heartbeat_interval_ms >= min_election / 2 {
            return Err(format!(
                "heartbeat_interval_ms ({}) should be << election_timeout_ms ({})",
                self.raft.heartbeat_interval_ms, min_election
            ));
        }

        if self.join.max_attempts == 0 {
            return Err("join.max_attempts must be > 0".to_string());
        }

        if self.timeouts.propose_ms == 0 || self.timeouts.admit_ms == 0 {
            return Err("timeouts must be > 0".to_string());
        }

        Ok(())
    }
}

/// Builder for ClusterConfig.
#[derive(Debug, Default)]
pub struct ClusterConfigBuilder {
    config: ClusterConfig,
}

impl ClusterConfigBuilder {
    /// Set the node ID.
    pub fn node_id(mut self, id: u64) -> Self {
        self.config.node_id = id;
        self
    }

    /// Set the Raft listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the advertise address.
    pub fn advertise_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.advertise_addr = Some(addr.into());
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set election timeout range in milliseconds.
    pub fn election_timeout_ms(mut self, min: u64, max: u64) -> Self {
        self.config.raft.election_timeout_ms = (min, max);
        self
    }

    /// Set heartbeat interval in milliseconds.
    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.raft.heartbeat_interval_ms = ms;
        self
    }

    /// Set snapshot threshold.
    pub fn snapshot_threshold(mut self, entries: u64) -> Self {
        self.config.snapshot.snapshot_threshold = entries;
        self
    }

    /// Set the propose deadline in milliseconds.
    pub fn propose_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.propose_ms = ms;
        self
    }

    /// Set the admit deadline in milliseconds.
    pub fn admit_timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeouts.admit_ms = ms;
        self
    }

    /// Set the join retry policy.
    pub fn join_policy(mut self, max_attempts: u32, backoff_ms: u64) -> Self {
        self.config.join = JoinConfig {
            max_attempts,
            backoff_ms,
        };
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ClusterConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

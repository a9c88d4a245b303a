//! Shared application state for API handlers.

use kvd_cluster::{Coordinator, HttpJoinClient, KvNode};
use std::sync::Arc;
use std::time::Instant;

/// Coordinator type used by the gateway.
pub type NodeCoordinator = Coordinator<KvNode, HttpJoinClient>;

/// Shared application state passed to all handlers.
pub struct AppState {
    /// Node name from the configuration file.
    pub name: String,
    /// The local cluster node.
    pub node: Arc<KvNode>,
    /// Membership coordinator for admitting joiners.
    pub coordinator: Arc<NodeCoordinator>,
    /// Server start time.
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        name: impl Into<String>,
        node: Arc<KvNode>,
        coordinator: Arc<NodeCoordinator>,
    ) -> Self {
        Self {
            name: name.into(),
            node,
            coordinator,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

//! Type definitions for the openraft integration.
//!
//! openraft is generic over a type configuration naming the application
//! payload and response types. The log carries [`EncodedCommand`] bytes so
//! that the state machine, not openraft, owns command decoding.

use crate::command::EncodedCommand;
use crate::state::KvResponse;
use openraft::BasicNode;
use std::io::Cursor;

/// Node ID type for the cluster.
pub type ClusterNodeId = u64;

openraft::declare_raft_types!(
    /// OpenRaft type configuration for kvd.
    pub TypeConfig:
        D = EncodedCommand,
        R = KvResponse,
);

/// Type alias for the Raft instance.
pub type ClusterRaft = openraft::Raft<TypeConfig>;

/// Type alias for log entry.
pub type ClusterEntry = openraft::Entry<TypeConfig>;

/// Type alias for vote.
pub type ClusterVote = openraft::Vote<ClusterNodeId>;

/// Type alias for log ID.
pub type ClusterLogId = openraft::LogId<ClusterNodeId>;

/// Type alias for stored membership.
pub type ClusterStoredMembership = openraft::StoredMembership<ClusterNodeId, BasicNode>;

/// Type alias for snapshot metadata.
pub type ClusterSnapshotMeta = openraft::SnapshotMeta<ClusterNodeId, BasicNode>;

/// Type alias for snapshot.
pub type ClusterSnapshot = openraft::storage::Snapshot<TypeConfig>;

/// Type alias for storage error.
pub type ClusterStorageError = openraft::StorageError<ClusterNodeId>;

/// Type alias for client write error.
pub type ClusterClientWriteError = openraft::error::ClientWriteError<ClusterNodeId, BasicNode>;

/// Type alias for raft error with client write error.
pub type ClusterRaftWriteError = openraft::error::RaftError<ClusterNodeId, ClusterClientWriteError>;

/// Type alias for raft error with initialize error.
pub type ClusterRaftInitError = openraft::error::RaftError<
    ClusterNodeId,
    openraft::error::InitializeError<ClusterNodeId, BasicNode>,
>;

/// A member of the cluster configuration as seen by the local engine.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MembershipEntry {
    /// Raft node id.
    pub id: ClusterNodeId,
    /// Raft peer address.
    pub address: String,
    /// Whether the member votes, as opposed to being a learner.
    pub voter: bool,
}

/// Leader hint extracted from a rejected write.
#[derive(Debug, Clone)]
pub struct LeaderInfo {
    /// The leader's node ID.
    pub leader_id: ClusterNodeId,
    /// The leader's raft address, if the engine knows it.
    pub leader_addr: Option<String>,
}

/// Extract forward-to-leader info from a client write error.
///
/// Returns `Some` only when the error is a `ForwardToLeader` naming a leader.
pub fn extract_forward_to_leader(error: &ClusterRaftWriteError) -> Option<LeaderInfo> {
    use openraft::error::RaftError;

    match error {
        RaftError::APIError(ClusterClientWriteError::ForwardToLeader(forward)) => {
            forward.leader_id.map(|leader_id| LeaderInfo {
                leader_id,
                leader_addr: forward
                    .leader_node
                    .as_ref()
                    .map(|n| n.addr.clone())
                    .filter(|addr| !addr.is_empty()),
            })
        }
        _ => None,
    }
}

/// Point-in-time view of a node, as reported by the engine's metrics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeStatus {
    /// This node's id.
    pub node_id: ClusterNodeId,
    /// Raft role: leader, follower, candidate, learner or shutdown.
    pub state: &'static str,
    /// Current term.
    pub term: u64,
    /// Current leader, if known.
    pub leader_id: Option<ClusterNodeId>,
    /// Raft address of the current leader, if known.
    pub leader_addr: Option<String>,
    /// Last log index appended locally.
    pub last_log_index: u64,
    /// Last log index applied to the state machine.
    pub last_applied: u64,
    /// Current cluster configuration.
    pub members: Vec<MembershipEntry>,
}

//! Error types for cluster operations.

use crate::command::CodecError;
use crate::types::ClusterNodeId;
use std::time::Duration;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Type alias for OpenRaft Raft errors.
pub type RaftError<E = openraft::error::Infallible> = openraft::error::RaftError<ClusterNodeId, E>;

/// Type alias for OpenRaft RPC errors.
pub type RPCError<E = openraft::error::Infallible> =
    openraft::error::RPCError<ClusterNodeId, openraft::BasicNode, RaftError<E>>;

/// Errors that can occur in cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The local node cannot commit writes; the leader hint is included if known.
    #[error("not the leader, leader is node {leader:?} at {leader_addr:?}")]
    NotLeader {
        /// The current leader if known.
        leader: Option<ClusterNodeId>,
        /// The leader's raft address if known.
        leader_addr: Option<String>,
    },

    /// A bounded engine call did not complete in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// Any other consensus engine failure.
    #[error("consensus engine error: {0}")]
    Engine(String),

    /// Command codec failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A join request was refused by the peer.
    #[error("join rejected by {peer}: {reason}")]
    JoinRejected {
        /// Peer the request was sent to.
        peer: String,
        /// Reason reported by the peer.
        reason: String,
    },

    /// A join request could not be admitted by this node.
    #[error("cannot admit node {id}: {reason}")]
    AdmitRejected {
        /// Candidate node id.
        id: ClusterNodeId,
        /// Why the candidate was refused.
        reason: String,
    },

    /// Every join attempt failed.
    #[error("failed to join cluster after {attempts} attempts")]
    JoinExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The raft transport server failed.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Replicated key-value store core for kvd.
//!
//! This crate turns an openraft consensus engine into a replicated
//! string-to-string map and manages how nodes enter the cluster.
//!
//! # Architecture
//!
//! ```text
//!            propose(Command)                      apply(entry)
//!   KvNode ─────────────────► openraft ─────────────────────► KvStateMachine
//!     │                      │   ▲    replicated log             │
//!     │                      ▼   │                               ▼
//!     │                  LogStorage   PeerNetwork / RaftServer   BTreeMap
//!     │                                (tonic gRPC)
//!     ▼
//!   Coordinator ── bootstrap / join (HttpJoinClient) / admit
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use kvd_cluster::{ClusterConfig, KvNode};
//!
//! let config = ClusterConfig::builder()
//!     .node_id(1)
//!     .listen_addr("127.0.0.1:5001")
//!     .data_dir("./data/node-1")
//!     .build()?;
//!
//! let node = KvNode::start(config).await?;
//! node.set("greeting", "hello").await?;
//! assert_eq!(node.get("greeting").await.as_deref(), Some("hello"));
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod membership;
pub mod network;
pub mod raft;
pub mod state;
pub mod types;

// Re-export main types
pub use command::{CodecError, Command, EncodedCommand};
pub use config::ClusterConfig;
pub use error::{ClusterError, ClusterResult};
pub use membership::{
    BootstrapOutcome, Coordinator, HttpJoinClient, JoinOutcome, JoinPolicy, JoinRequest,
    JoinTransport, MembershipEngine,
};
pub use raft::KvNode;
pub use state::{KvResponse, KvStateMachine};
pub use types::{ClusterNodeId, MembershipEntry, NodeStatus, TypeConfig};

// Generated protobuf code
pub mod proto {
    tonic::include_proto!("kvd.raft");
}

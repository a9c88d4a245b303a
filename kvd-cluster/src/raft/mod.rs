//! Raft integration module.
//!
//! [`KvNode`] ties together:
//! - Log storage (RaftLogStorage)
//! - State machine (KvStateMachine)
//! - Network (RaftNetwork)
//! - The Raft instance itself

mod node;
mod storage;

pub use node::KvNode;
pub use storage::LogStorage;

//! gRPC transport for Raft peer traffic.
//!
//! Each RPC carries one JSON encoded openraft request or response in a
//! `bytes` field, so the protobuf schema stays the same whatever openraft
//! puts inside.

mod client;
mod server;

pub use client::{PeerConnection, PeerNetwork};
pub use server::RaftServer;

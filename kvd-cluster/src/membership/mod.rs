//! Cluster membership: bootstrapping, joining and admitting nodes.
//!
//! A node starts in exactly one of two ways. A bootstrapping node
//! initializes a single-member cluster containing itself. A joining node
//! asks an existing member, over HTTP, to add it as a voter and retries
//! until it succeeds or runs out of attempts. Any member that is the
//! leader can admit a joiner.
//!
//! The protocol runs against two seams, [`MembershipEngine`] (the local
//! consensus engine) and [`JoinTransport`] (the way join requests travel),
//! so it can be exercised without a network.

mod coordinator;
mod join;

pub use coordinator::{BootstrapOutcome, Coordinator, JoinOutcome, JoinPolicy, MembershipEngine};
pub use join::{HttpJoinClient, JoinRequest, JoinTransport};

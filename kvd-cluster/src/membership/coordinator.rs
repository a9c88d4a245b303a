//! The membership coordinator.

use crate::config::JoinConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::types::{ClusterNodeId, MembershipEntry};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::join::{JoinRequest, JoinTransport};

/// What the coordinator needs from the local consensus engine.
pub trait MembershipEngine: Send + Sync {
    /// This node's id.
    fn node_id(&self) -> ClusterNodeId;

    /// Raft address other members should use to reach this node.
    fn advertise_addr(&self) -> &str;

    /// Current cluster configuration as seen locally. Empty on a node that
    /// has never been part of a cluster.
    fn members(&self) -> Vec<MembershipEntry>;

    /// Last log index known locally.
    fn last_log_index(&self) -> u64;

    /// Initialize a single-member cluster containing this node.
    fn initialize(&self) -> impl Future<Output = ClusterResult<BootstrapOutcome>> + Send;

    /// Add `id` at `address` as a voter. Only succeeds on the leader.
    fn add_voter(
        &self,
        id: ClusterNodeId,
        address: String,
    ) -> impl Future<Output = ClusterResult<()>> + Send;
}

/// Result of a bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// This call created the cluster.
    Bootstrapped,
    /// The engine already had a configuration; nothing changed.
    AlreadyBootstrapped,
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The node was already in a cluster configuration; no request was sent.
    AlreadyMember,
    /// A peer admitted the node on the given attempt.
    Joined {
        /// 1-based attempt that succeeded.
        attempts: u32,
    },
}

/// Retry policy for joining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPolicy {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Pause between failed attempts.
    pub backoff: Duration,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        (&JoinConfig::default()).into()
    }
}

impl From<&JoinConfig> for JoinPolicy {
    fn from(config: &JoinConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.backoff(),
        }
    }
}

/// Drives bootstrap, join and admission against a [`MembershipEngine`].
pub struct Coordinator<E, T> {
    engine: Arc<E>,
    transport: T,
    policy: JoinPolicy,
    admit_timeout: Duration,
}

impl<E, T> Coordinator<E, T>
where
    E: MembershipEngine,
    T: JoinTransport,
{
    /// Coordinate membership for `engine`, sending join requests over
    /// `transport`. `admit_timeout` bounds each voter admission.
    pub fn new(engine: Arc<E>, transport: T, policy: JoinPolicy, admit_timeout: Duration) -> Self {
        Self {
            engine,
            transport,
            policy,
            admit_timeout,
        }
    }

    /// The engine whose membership this coordinator changes.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Make this node the sole member of a new cluster.
    ///
    /// Safe to call on every start: an engine that already holds a
    /// configuration reports [`BootstrapOutcome::AlreadyBootstrapped`].
    pub async fn bootstrap(&self) -> ClusterResult<BootstrapOutcome> {
        let outcome = self.engine.initialize().await?;
        match outcome {
            BootstrapOutcome::Bootstrapped => {
                tracing::info!(node_id = self.engine.node_id(), "bootstrapped cluster");
            }
            BootstrapOutcome::AlreadyBootstrapped => {
                tracing::info!(
                    node_id = self.engine.node_id(),
                    "cluster already bootstrapped"
                );
            }
        }
        Ok(outcome)
    }

    /// Ask `peer` to admit this node, retrying per the join policy.
    ///
    /// Returns [`ClusterError::JoinExhausted`] once every attempt failed.
    pub async fn join(&self, peer: &str) -> ClusterResult<JoinOutcome> {
        let node_id = self.engine.node_id();
        let max_attempts = self.policy.max_attempts;

        for attempt in 1..=max_attempts {
            if !self.engine.members().is_empty() {
                if attempt == 1 {
                    tracing::info!(node_id, "already a cluster member, skipping join");
                    return Ok(JoinOutcome::AlreadyMember);
                }
                // An earlier attempt was applied even though its reply was lost.
                tracing::info!(node_id, peer, "joined cluster");
                return Ok(JoinOutcome::Joined {
                    attempts: attempt - 1,
                });
            }

            let request = JoinRequest {
                id: node_id,
                address: self.engine.advertise_addr().to_string(),
                last_index: self.engine.last_log_index(),
            };

            match self.transport.request_join(peer, &request).await {
                Ok(()) => {
                    tracing::info!(node_id, peer, attempt, "joined cluster");
                    return Ok(JoinOutcome::Joined { attempts: attempt });
                }
                Err(e) => {
                    tracing::warn!(
                        node_id,
                        peer,
                        attempt,
                        max_attempts,
                        error = %e,
                        "join attempt failed"
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(self.policy.backoff).await;
                    }
                }
            }
        }

        Err(ClusterError::JoinExhausted {
            attempts: max_attempts,
        })
    }

    /// Admit a joining node as a voter.
    ///
    /// A candidate that is already a voter at the same address is accepted
    /// without touching the configuration. Failures are returned to the
    /// caller and never affect this node.
    pub async fn admit(&self, request: JoinRequest) -> ClusterResult<()> {
        if request.id == 0 {
            return Err(ClusterError::AdmitRejected {
                id: request.id,
                reason: "node id must be > 0".to_string(),
            });
        }
        if request.address.is_empty() {
            return Err(ClusterError::AdmitRejected {
                id: request.id,
                reason: "address is required".to_string(),
            });
        }

        let existing = self
            .engine
            .members()
            .into_iter()
            .find(|m| m.id == request.id);
        if let Some(member) = existing {
            if member.voter && member.address == request.address {
                tracing::debug!(node_id = request.id, "candidate is already a voter");
                return Ok(());
            }
        }

        tracing::info!(
            node_id = request.id,
            addr = %request.address,
            last_index = request.last_index,
            "admitting node"
        );

        let add = self.engine.add_voter(request.id, request.address.clone());
        match tokio::time::timeout(self.admit_timeout, add).await {
            Ok(Ok(())) => {
                tracing::info!(node_id = request.id, "node admitted as voter");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(node_id = request.id, error = %e, "failed to admit node");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(node_id = request.id, "admitting node timed out");
                Err(ClusterError::Timeout {
                    operation: "add voter",
                    after: self.admit_timeout,
                })
            }
        }
    }
}

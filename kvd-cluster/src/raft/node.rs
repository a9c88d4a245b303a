//! KvNode - the handle the rest of the process uses to reach the cluster.

use crate::command::{Command, encode};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::membership::{BootstrapOutcome, MembershipEngine};
use crate::network::{PeerNetwork, RaftServer};
use crate::raft::storage::LogStorage;
use crate::state::{KvResponse, KvStateMachine};
use crate::types::{
    ClusterClientWriteError, ClusterNodeId, ClusterRaft, ClusterRaftWriteError, MembershipEntry,
    NodeStatus, extract_forward_to_leader,
};
use openraft::error::{InitializeError, RaftError};
use openraft::{BasicNode, Config, Raft, RaftMetrics, ServerState};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::Server;
use tonic::transport::server::TcpIncoming;

type ServerTask = JoinHandle<Result<(), tonic::transport::Error>>;

/// Time the Raft RPC server gets to drain open connections on shutdown.
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A running kvd node.
///
/// Owns the Raft instance, the key-value state machine and the Raft gRPC
/// server. Writes go through [`KvNode::propose`]; reads are served from the
/// local replica.
pub struct KvNode {
    node_id: ClusterNodeId,
    advertise_addr: String,
    raft: Arc<ClusterRaft>,
    state_machine: Arc<KvStateMachine>,
    propose_timeout: Duration,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    server: tokio::sync::Mutex<Option<ServerTask>>,
}

impl KvNode {
    /// Open storage, start the Raft core and serve Raft RPCs on
    /// `config.listen_addr`.
    ///
    /// Fails if the Raft listener cannot be bound.
    pub async fn start(config: ClusterConfig) -> ClusterResult<Self> {
        config.validate().map_err(ClusterError::Config)?;

        let node_id = config.node_id;
        let listener = TcpListener::bind(&config.listen_addr).await?;
        let addr = listener.local_addr()?;
        let incoming = TcpIncoming::from_listener(listener, true, None)
            .map_err(|e| ClusterError::Io(std::io::Error::other(e)))?;

        let log_storage = LogStorage::open(&config.data_dir)?;
        let state_machine = Arc::new(KvStateMachine::open(config.data_dir.join("snapshot"))?);

        let raft_config = Config {
            cluster_name: "kvd".to_string(),
            election_timeout_min: config.raft.election_timeout_ms.0,
            election_timeout_max: config.raft.election_timeout_ms.1,
            heartbeat_interval: config.raft.heartbeat_interval_ms,
            max_payload_entries: config.raft.max_entries_per_append,
            snapshot_policy: openraft::SnapshotPolicy::LogsSinceLast(
                config.snapshot.snapshot_threshold,
            ),
            ..Default::default()
        };
        let raft_config = Arc::new(
            raft_config
                .validate()
                .map_err(|e| ClusterError::Config(e.to_string()))?,
        );

        let raft = Raft::new(
            node_id,
            raft_config,
            PeerNetwork::new(),
            log_storage,
            Arc::clone(&state_machine),
        )
        .await
        .map_err(|e| ClusterError::Storage(format!("failed to create raft: {}", e)))?;
        let raft = Arc::new(raft);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let raft_server = RaftServer::new(Arc::clone(&raft));
        let server = tokio::spawn(async move {
            let served = Server::builder()
                .add_service(raft_server.into_service())
                .serve_with_incoming_shutdown(incoming, async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = &served {
                tracing::error!(node_id, %addr, error = %e, "raft server stopped");
            }
            served
        });

        tracing::info!(node_id, %addr, "raft node started");

        Ok(Self {
            node_id,
            advertise_addr: config.advertise_addr().to_string(),
            raft,
            state_machine,
            propose_timeout: config.propose_timeout(),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            server: tokio::sync::Mutex::new(Some(server)),
        })
    }

    /// Submit a command and wait until it is committed and applied locally.
    ///
    /// Fails with [`ClusterError::NotLeader`] on a follower and with
    /// [`ClusterError::Timeout`] when the engine does not finish in time.
    pub async fn propose(&self, command: Command) -> ClusterResult<KvResponse> {
        let payload = encode(&command)?;
        tracing::debug!(op = command.name(), key = command.key(), "proposing command");

        match tokio::time::timeout(self.propose_timeout, self.raft.client_write(payload)).await {
            Ok(Ok(response)) => Ok(response.data),
            Ok(Err(e)) => Err(to_write_error(e)),
            Err(_) => Err(ClusterError::Timeout {
                operation: "propose",
                after: self.propose_timeout,
            }),
        }
    }

    /// Replicate `key = value`.
    pub async fn set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> ClusterResult<KvResponse> {
        self.propose(Command::set(key, value)).await
    }

    /// Replicate removal of `key`.
    pub async fn delete(&self, key: impl Into<String>) -> ClusterResult<KvResponse> {
        self.propose(Command::delete(key)).await
    }

    /// Read `key` from the local replica.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.state_machine.get(key).await
    }

    /// Copy of the local replica's map.
    pub async fn get_all(&self) -> BTreeMap<String, String> {
        self.state_machine.get_all().await
    }

    /// Get a reference to the state machine for read-only queries.
    pub fn state_machine(&self) -> &KvStateMachine {
        &self.state_machine
    }

    /// Get this node's ID.
    pub fn node_id(&self) -> ClusterNodeId {
        self.node_id
    }

    /// Get the current leader's node ID.
    pub async fn leader(&self) -> Option<ClusterNodeId> {
        self.raft.current_leader().await
    }

    /// Check if this node is the leader.
    pub async fn is_leader(&self) -> bool {
        self.raft.current_leader().await == Some(self.node_id)
    }

    /// The current leader and its Raft address, from the latest metrics.
    pub fn leader_info(&self) -> Option<(ClusterNodeId, Option<String>)> {
        let metrics = self.metrics();
        let leader = metrics.current_leader?;
        let addr = metrics
            .membership_config
            .nodes()
            .find(|(id, _)| **id == leader)
            .map(|(_, node)| node.addr.clone())
            .filter(|addr| !addr.is_empty());
        Some((leader, addr))
    }

    /// Get cluster metrics.
    pub fn metrics(&self) -> RaftMetrics<ClusterNodeId, BasicNode> {
        self.raft.metrics().borrow().clone()
    }

    /// Role, term, leader and log progress of this node.
    pub fn status(&self) -> NodeStatus {
        let metrics = self.metrics();
        let leader_addr = metrics.current_leader.and_then(|leader| {
            metrics
                .membership_config
                .nodes()
                .find(|(id, _)| **id == leader)
                .map(|(_, node)| node.addr.clone())
        });

        NodeStatus {
            node_id: self.node_id,
            state: match metrics.state {
                ServerState::Leader => "leader",
                ServerState::Follower => "follower",
                ServerState::Candidate => "candidate",
                ServerState::Learner => "learner",
                ServerState::Shutdown => "shutdown",
            },
            term: metrics.current_term,
            leader_id: metrics.current_leader,
            leader_addr,
            last_log_index: metrics.last_log_index.unwrap_or(0),
            last_applied: metrics.last_applied.map(|id| id.index).unwrap_or(0),
            members: members_of(&metrics),
        }
    }

    /// Trigger a snapshot.
    pub async fn trigger_snapshot(&self) -> ClusterResult<()> {
        self.raft
            .trigger()
            .snapshot()
            .await
            .map_err(|e| ClusterError::Engine(e.to_string()))
    }

    /// Resolve once the Raft core or the Raft RPC server has stopped.
    ///
    /// A state machine that cannot apply a committed entry stops the core.
    /// The server stopping before [`KvNode::shutdown`] is fatal too. The
    /// process should exit when this returns.
    pub async fn wait_fatal(&self) -> ClusterError {
        tokio::select! {
            fatal = self.wait_core_stopped() => fatal,
            fatal = self.wait_server_stopped() => fatal,
        }
    }

    async fn wait_core_stopped(&self) -> ClusterError {
        let mut metrics = self.raft.metrics();
        loop {
            let fatal = metrics.borrow().running_state.clone().err();
            if let Some(fatal) = fatal {
                return ClusterError::Engine(format!("raft core stopped: {}", fatal));
            }
            if metrics.changed().await.is_err() {
                return ClusterError::Engine("raft metrics channel closed".to_string());
            }
        }
    }

    async fn wait_server_stopped(&self) -> ClusterError {
        let mut server = self.server.lock().await;
        let Some(task) = server.as_mut() else {
            drop(server);
            return std::future::pending().await;
        };
        let served = task.await;
        *server = None;
        drop(server);

        if self.shutdown_tx.lock().is_none() {
            return std::future::pending().await;
        }
        match served {
            Ok(Ok(())) => ClusterError::Engine("raft server stopped".to_string()),
            Ok(Err(e)) => ClusterError::Transport(e),
            Err(e) => ClusterError::Engine(format!("raft server task failed: {}", e)),
        }
    }

    /// Shutdown the node gracefully.
    pub async fn shutdown(&self) -> ClusterResult<()> {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }

        let server = self.server.lock().await.take();
        if let Some(mut server) = server {
            match tokio::time::timeout(SERVER_STOP_TIMEOUT, &mut server).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => tracing::warn!(error = %e, "raft server stopped with error"),
                Ok(Err(e)) => tracing::warn!(error = %e, "raft server task failed"),
                Err(_) => {
                    tracing::warn!("raft server did not drain in time");
                    server.abort();
                }
            }
        }

        self.raft
            .shutdown()
            .await
            .map_err(|e| ClusterError::Engine(format!("shutdown error: {}", e)))?;

        tracing::info!(node_id = self.node_id, "raft node shut down");
        Ok(())
    }
}

impl Drop for KvNode {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.get_mut().take() {
            let _ = tx.send(());
        }
    }
}

impl MembershipEngine for KvNode {
    fn node_id(&self) -> ClusterNodeId {
        self.node_id
    }

    fn advertise_addr(&self) -> &str {
        &self.advertise_addr
    }

    fn members(&self) -> Vec<MembershipEntry> {
        members_of(&self.metrics())
    }

    fn last_log_index(&self) -> u64 {
        self.raft.metrics().borrow().last_log_index.unwrap_or(0)
    }

    async fn initialize(&self) -> ClusterResult<BootstrapOutcome> {
        let mut members = BTreeMap::new();
        members.insert(
            self.node_id,
            BasicNode {
                addr: self.advertise_addr.clone(),
            },
        );

        match self.raft.initialize(members).await {
            Ok(()) => Ok(BootstrapOutcome::Bootstrapped),
            Err(RaftError::APIError(InitializeError::NotAllowed(_))) => {
                Ok(BootstrapOutcome::AlreadyBootstrapped)
            }
            Err(e) => Err(ClusterError::Engine(e.to_string())),
        }
    }

    async fn add_voter(&self, id: ClusterNodeId, address: String) -> ClusterResult<()> {
        self.raft
            .add_learner(id, BasicNode { addr: address }, true)
            .await
            .map_err(to_write_error)?;

        let mut voters: BTreeSet<ClusterNodeId> =
            self.metrics().membership_config.voter_ids().collect();
        voters.insert(id);

        self.raft
            .change_membership(voters, false)
            .await
            .map_err(to_write_error)?;
        Ok(())
    }
}

fn members_of(metrics: &RaftMetrics<ClusterNodeId, BasicNode>) -> Vec<MembershipEntry> {
    let voters: BTreeSet<ClusterNodeId> = metrics.membership_config.voter_ids().collect();
    metrics
        .membership_config
        .nodes()
        .map(|(id, node)| MembershipEntry {
            id: *id,
            address: node.addr.clone(),
            voter: voters.contains(id),
        })
        .collect()
}

/// Map a rejected write or membership change to a cluster error.
fn to_write_error(e: ClusterRaftWriteError) -> ClusterError {
    if let Some(leader) = extract_forward_to_leader(&e) {
        return ClusterError::NotLeader {
            leader: Some(leader.leader_id),
            leader_addr: leader.leader_addr,
        };
    }
    match e {
        RaftError::APIError(ClusterClientWriteError::ForwardToLeader(_)) => {
            ClusterError::NotLeader {
                leader: None,
                leader_addr: None,
            }
        }
        other => ClusterError::Engine(other.to_string()),
    }
}

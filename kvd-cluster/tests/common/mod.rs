//! Common test utilities for kvd-cluster tests.

use kvd_cluster::{
    ClusterConfig, ClusterResult, Coordinator, HttpJoinClient, JoinPolicy, JoinRequest,
    JoinTransport, KvNode,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Atomic counter for allocating unique ports.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(15000);

/// Get a unique port for testing.
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Config for node `node_id` with fast join retries.
pub fn node_config(node_id: u64, data_dir: &std::path::Path) -> ClusterConfig {
    ClusterConfig::builder()
        .node_id(node_id)
        .listen_addr(format!("127.0.0.1:{}", get_test_port()))
        .data_dir(data_dir)
        .join_policy(5, 200)
        .build()
        .expect("Invalid config")
}

/// Coordinator over a node, joining through `transport`.
pub fn coordinator<T: JoinTransport>(node: &Arc<KvNode>, transport: T) -> Coordinator<KvNode, T> {
    Coordinator::new(
        Arc::clone(node),
        transport,
        JoinPolicy {
            max_attempts: 5,
            backoff: Duration::from_millis(200),
        },
        Duration::from_secs(10),
    )
}

/// Delivers join requests straight to the target node's coordinator.
#[derive(Clone, Default)]
pub struct InProcessJoin {
    peers: HashMap<String, Arc<KvNode>>,
}

#[allow(dead_code)]
impl InProcessJoin {
    pub fn with_peer(mut self, addr: impl Into<String>, node: &Arc<KvNode>) -> Self {
        self.peers.insert(addr.into(), Arc::clone(node));
        self
    }
}

impl JoinTransport for InProcessJoin {
    fn request_join(
        &self,
        peer: &str,
        request: &JoinRequest,
    ) -> impl Future<Output = ClusterResult<()>> + Send {
        let target = self.peers.get(peer).cloned();
        let request = request.clone();
        let peer = peer.to_string();
        async move {
            let Some(target) = target else {
                return Err(kvd_cluster::ClusterError::JoinRejected {
                    peer,
                    reason: "unknown peer".to_string(),
                });
            };
            coordinator(&target, HttpJoinClient::new(Duration::from_secs(1)))
                .admit(request)
                .await
        }
    }
}

/// Test context that holds temp directories and nodes.
#[allow(dead_code)]
pub struct TestCluster {
    /// Temp directories for each node (kept alive for the test duration).
    _temp_dirs: Vec<TempDir>,
    /// Cluster nodes, node `i` has id `i + 1`.
    pub nodes: Vec<Arc<KvNode>>,
}

#[allow(dead_code)]
impl TestCluster {
    /// Start `node_count` nodes, none of them initialized.
    pub async fn new(node_count: usize) -> Self {
        let mut temp_dirs = Vec::with_capacity(node_count);
        let mut nodes = Vec::with_capacity(node_count);

        for i in 0..node_count {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let config = node_config(i as u64 + 1, temp_dir.path());
            temp_dirs.push(temp_dir);

            let node = KvNode::start(config).await.expect("Failed to start node");
            nodes.push(Arc::new(node));
        }

        Self {
            _temp_dirs: temp_dirs,
            nodes,
        }
    }

    /// Wait for a leader to be elected.
    pub async fn wait_for_leader(&self, timeout_ms: u64) -> Option<u64> {
        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);

        while start.elapsed() < timeout {
            for node in &self.nodes {
                if let Some(leader) = node.leader().await {
                    return Some(leader);
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        None
    }

    /// Shutdown all nodes.
    pub async fn shutdown(&self) {
        for node in &self.nodes {
            let _ = node.shutdown().await;
        }
    }
}

/// Poll `condition` every 50ms until it holds or `timeout_ms` elapses.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

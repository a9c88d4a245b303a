//! Common test utilities for kvd-server tests.

use kvd_server::{Node, NodeConfig};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

/// Atomic counter for allocating unique ports.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(25000);

/// Get a unique port for testing.
pub fn get_test_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Config for node `id` with fresh ports, neither bootstrapping nor joining.
pub fn node_config(id: u64, data_dir: &Path) -> NodeConfig {
    NodeConfig {
        name: format!("node-{}", id),
        id,
        host: "127.0.0.1".to_string(),
        port: get_test_port(),
        raft_port: get_test_port(),
        bootstrap: false,
        join_addr: None,
        data_dir: data_dir.to_path_buf(),
        log_format: None,
        log_level: None,
        raft: Default::default(),
        snapshot_threshold: None,
    }
}

/// Start a node, panicking on failure.
pub async fn start(config: NodeConfig) -> Node {
    config.validate().expect("Invalid config");
    Node::start(config).await.expect("Failed to start node")
}

/// Base URL of a node's gateway.
pub fn base_url(node: &Node) -> String {
    format!("http://{}", node.http_addr())
}

/// Wait until the node reports a leader.
pub async fn wait_for_leader(node: &Node, timeout_ms: u64) -> Option<u64> {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        if let Some(leader) = node.kv().leader().await {
            return Some(leader);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    None
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

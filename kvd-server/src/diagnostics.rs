//! Periodic diagnostics.

use kvd_cluster::KvNode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How often the leader logger reports.
pub const LEADER_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Log the current leader every `every` until the task is aborted.
pub fn spawn_leader_logger(node: Arc<KvNode>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match node.leader_info() {
                Some((leader, addr)) => {
                    tracing::info!(leader, leader_addr = ?addr, "current leader");
                }
                None => tracing::info!("no leader known"),
            }
        }
    })
}

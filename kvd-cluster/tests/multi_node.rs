//! Multi-node cluster tests.
//!
//! Bootstraps one node, joins two more through the membership protocol and
//! checks that writes replicate.

mod common;

use common::{InProcessJoin, TestCluster};
use kvd_cluster::{ClusterError, HttpJoinClient, JoinOutcome};
use std::sync::Arc;
use std::time::Duration;

async fn three_node_cluster() -> TestCluster {
    let cluster = TestCluster::new(3).await;
    let leader = &cluster.nodes[0];

    common::coordinator(leader, HttpJoinClient::new(Duration::from_secs(1)))
        .bootstrap()
        .await
        .expect("Failed to bootstrap");
    assert_eq!(cluster.wait_for_leader(5000).await, Some(1));

    let leader_addr = "node-1".to_string();
    let transport = InProcessJoin::default().with_peer(leader_addr.clone(), leader);

    for joiner in &cluster.nodes[1..] {
        let outcome = common::coordinator(joiner, transport.clone())
            .join(&leader_addr)
            .await
            .expect("Failed to join");
        assert!(matches!(outcome, JoinOutcome::Joined { .. }));
    }

    cluster
}

/// Bootstrap plus two sequential joins produce a three-voter cluster.
#[tokio::test]
async fn test_three_node_membership() {
    let cluster = three_node_cluster().await;

    let voters = cluster.nodes[0]
        .metrics()
        .membership_config
        .voter_ids()
        .count();
    assert_eq!(voters, 3, "All nodes should be voters");

    for node in &cluster.nodes {
        let converged = common::wait_until(5000, || {
            let node = Arc::clone(node);
            async move { node.status().members.len() == 3 }
        })
        .await;
        assert!(converged, "node {} should see 3 members", node.node_id());
    }

    cluster.shutdown().await;
}

/// A committed write becomes visible on every replica.
#[tokio::test]
async fn test_write_replicates_to_followers() {
    let cluster = three_node_cluster().await;

    cluster.nodes[0]
        .set("replicated", "value")
        .await
        .expect("Write on leader should succeed");

    for node in &cluster.nodes {
        let visible = common::wait_until(5000, || {
            let node = Arc::clone(node);
            async move { node.get("replicated").await.as_deref() == Some("value") }
        })
        .await;
        assert!(visible, "node {} should apply the write", node.node_id());
    }

    cluster.shutdown().await;
}

/// Writes on a follower are refused with a leader hint.
#[tokio::test]
async fn test_follower_write_reports_leader() {
    let cluster = three_node_cluster().await;
    let follower = &cluster.nodes[1];

    let knows_leader = common::wait_until(5000, || {
        let follower = Arc::clone(follower);
        async move { follower.leader().await == Some(1) }
    })
    .await;
    assert!(knows_leader, "Follower should learn the leader");

    let err = follower.set("k", "v").await.unwrap_err();
    match err {
        ClusterError::NotLeader {
            leader,
            leader_addr,
        } => {
            assert_eq!(leader, Some(1));
            let expected = cluster.nodes[0].status().members[0].address.clone();
            assert_eq!(leader_addr, Some(expected));
        }
        other => panic!("expected NotLeader, got {other}"),
    }

    cluster.shutdown().await;
}

/// A node that is already a member does not contact anyone.
#[tokio::test]
async fn test_rejoin_is_a_no_op() {
    let cluster = three_node_cluster().await;
    let joiner = &cluster.nodes[2];

    let replicated = common::wait_until(5000, || {
        let joiner = Arc::clone(joiner);
        async move { !joiner.status().members.is_empty() }
    })
    .await;
    assert!(replicated, "Membership should reach the last joiner");

    let outcome = common::coordinator(joiner, InProcessJoin::default())
        .join("node-1")
        .await
        .expect("Rejoin should succeed");
    assert_eq!(outcome, JoinOutcome::AlreadyMember);

    cluster.shutdown().await;
}

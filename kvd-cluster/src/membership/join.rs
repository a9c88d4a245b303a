//! Join requests and the HTTP client that sends them.

use crate::error::{ClusterError, ClusterResult};
use crate::types::ClusterNodeId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Request from a node asking to be admitted as a voter.
///
/// ```text
/// {"id": 2, "address": "127.0.0.1:5002", "lastIndex": 0}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Raft node id of the candidate.
    pub id: ClusterNodeId,
    /// Raft address of the candidate.
    pub address: String,
    /// Last log index the candidate has seen.
    #[serde(rename = "lastIndex", default)]
    pub last_index: u64,
}

/// How join requests reach an existing member.
pub trait JoinTransport: Send + Sync {
    /// Ask `peer` to admit the sender. `Ok` means the peer accepted.
    fn request_join(
        &self,
        peer: &str,
        request: &JoinRequest,
    ) -> impl Future<Output = ClusterResult<()>> + Send;
}

/// Sends join requests as `POST http://<peer>/join`.
#[derive(Debug, Clone)]
pub struct HttpJoinClient {
    http: reqwest::Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct RejectionBody {
    message: String,
}

impl HttpJoinClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    fn join_url(peer: &str) -> String {
        let base = peer.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}/join", base)
        } else {
            format!("http://{}/join", base)
        }
    }
}

impl JoinTransport for HttpJoinClient {
    async fn request_join(&self, peer: &str, request: &JoinRequest) -> ClusterResult<()> {
        let response = self
            .http
            .post(Self::join_url(peer))
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<RejectionBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| format!("HTTP {}", status));

        Err(ClusterError::JoinRejected {
            peer: peer.to_string(),
            reason,
        })
    }
}

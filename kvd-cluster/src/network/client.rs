//! Outbound Raft RPCs, implementing OpenRaft's network traits.

use crate::error::RPCError;
use crate::proto::raft_service_client::RaftServiceClient;
use crate::proto::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use crate::types::{ClusterNodeId, TypeConfig};
use openraft::BasicNode;
use openraft::error::{InstallSnapshotError, NetworkError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest as RaftAppendRequest, AppendEntriesResponse as RaftAppendResponse,
    InstallSnapshotRequest as RaftSnapshotRequest, InstallSnapshotResponse as RaftSnapshotResponse,
    VoteRequest as RaftVoteRequest, VoteResponse as RaftVoteResponse,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tonic::transport::Channel;

/// Factory handing out connections to peers.
///
/// Channels are created lazily and cached per node id. A cached channel is
/// replaced when the node shows up under a different address.
#[derive(Clone, Default)]
pub struct PeerNetwork {
    channels: Arc<RwLock<HashMap<ClusterNodeId, (String, Channel)>>>,
}

impl PeerNetwork {
    /// A factory with no cached peer channels.
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, target: ClusterNodeId, addr: &str) -> Result<Channel, RpcFailure> {
        {
            let channels = self.channels.read();
            if let Some((cached_addr, channel)) = channels.get(&target) {
                if cached_addr == addr {
                    return Ok(channel.clone());
                }
            }
        }

        let channel = Channel::from_shared(format!("http://{}", addr))
            .map_err(|e| RpcFailure::Unreachable(Unreachable::new(&e)))?
            .connect_lazy();

        tracing::debug!(target, addr, "opened raft channel");
        self.channels
            .write()
            .insert(target, (addr.to_string(), channel.clone()));
        Ok(channel)
    }
}

impl RaftNetworkFactory<TypeConfig> for PeerNetwork {
    type Network = PeerConnection;

    async fn new_client(&mut self, target: ClusterNodeId, node: &BasicNode) -> Self::Network {
        PeerConnection {
            target,
            addr: node.addr.clone(),
            network: self.clone(),
        }
    }
}

/// A connection to one peer.
pub struct PeerConnection {
    target: ClusterNodeId,
    addr: String,
    network: PeerNetwork,
}

impl PeerConnection {
    fn client(&self) -> Result<RaftServiceClient<Channel>, RpcFailure> {
        Ok(RaftServiceClient::new(
            self.network.channel(self.target, &self.addr)?,
        ))
    }
}

impl RaftNetwork<TypeConfig> for PeerConnection {
    async fn append_entries(
        &mut self,
        req: RaftAppendRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<RaftAppendResponse<ClusterNodeId>, RPCError> {
        let mut request = tonic::Request::new(AppendEntriesRequest {
            data: encode_rpc(&req)?,
        });
        request.set_timeout(option.hard_ttl());

        let response = self.client()?.append_entries(request).await;
        Ok(decode_rpc(&response.map_err(RpcFailure::from)?.into_inner().data)?)
    }

    async fn install_snapshot(
        &mut self,
        req: RaftSnapshotRequest<TypeConfig>,
        option: RPCOption,
    ) -> Result<RaftSnapshotResponse<ClusterNodeId>, RPCError<InstallSnapshotError>> {
        let mut request = tonic::Request::new(InstallSnapshotRequest {
            data: encode_rpc(&req)?,
        });
        request.set_timeout(option.hard_ttl());

        let response = self.client()?.install_snapshot(request).await;
        Ok(decode_rpc(&response.map_err(RpcFailure::from)?.into_inner().data)?)
    }

    async fn vote(
        &mut self,
        req: RaftVoteRequest<ClusterNodeId>,
        option: RPCOption,
    ) -> Result<RaftVoteResponse<ClusterNodeId>, RPCError> {
        let mut request = tonic::Request::new(VoteRequest {
            data: encode_rpc(&req)?,
        });
        request.set_timeout(option.hard_ttl());

        let response = self.client()?.request_vote(request).await;
        Ok(decode_rpc(&response.map_err(RpcFailure::from)?.into_inner().data)?)
    }
}

/// Transport failure before openraft's error type is chosen.
#[derive(Debug)]
enum RpcFailure {
    /// The peer could not be reached; openraft backs off.
    Unreachable(Unreachable),
    /// Anything else that went wrong on the wire.
    Network(NetworkError),
}

impl From<tonic::Status> for RpcFailure {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            tonic::Code::Unavailable | tonic::Code::DeadlineExceeded => {
                RpcFailure::Unreachable(Unreachable::new(&status))
            }
            _ => RpcFailure::Network(NetworkError::new(&status)),
        }
    }
}

impl From<serde_json::Error> for RpcFailure {
    fn from(e: serde_json::Error) -> Self {
        RpcFailure::Network(NetworkError::new(&e))
    }
}

impl<E> From<RpcFailure> for RPCError<E>
where
    E: std::error::Error + 'static,
{
    fn from(failure: RpcFailure) -> Self {
        match failure {
            RpcFailure::Unreachable(e) => openraft::error::RPCError::Unreachable(e),
            RpcFailure::Network(e) => openraft::error::RPCError::Network(e),
        }
    }
}

fn encode_rpc<T: Serialize>(value: &T) -> Result<Vec<u8>, RpcFailure> {
    Ok(serde_json::to_vec(value)?)
}

fn decode_rpc<T: DeserializeOwned>(data: &[u8]) -> Result<T, RpcFailure> {
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channels_are_cached_per_node_and_address() {
        let network = PeerNetwork::new();

        network.channel(2, "127.0.0.1:7002").expect("channel");
        network.channel(2, "127.0.0.1:7002").expect("cached channel");
        assert_eq!(network.channels.read().len(), 1);

        network
            .channel(2, "127.0.0.1:7102")
            .expect("replacement channel");
        let channels = network.channels.read();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[&2].0, "127.0.0.1:7102");
    }

    #[test]
    fn unavailable_maps_to_unreachable() {
        let err: RPCError = RpcFailure::from(tonic::Status::unavailable("down")).into();
        assert!(matches!(err, openraft::error::RPCError::Unreachable(_)));

        let err: RPCError = RpcFailure::from(tonic::Status::internal("boom")).into();
        assert!(matches!(err, openraft::error::RPCError::Network(_)));
    }
}

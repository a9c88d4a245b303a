//! Inbound Raft RPCs.

use crate::proto::raft_service_server::{RaftService, RaftServiceServer};
use crate::proto::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use crate::types::{ClusterNodeId, ClusterRaft, TypeConfig};
use openraft::raft::{
    AppendEntriesRequest as RaftAppendRequest, InstallSnapshotRequest as RaftSnapshotRequest,
    VoteRequest as RaftVoteRequest,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// gRPC service feeding peer RPCs into the local Raft instance.
pub struct RaftServer {
    raft: Arc<ClusterRaft>,
}

impl RaftServer {
    /// Serve RPCs for `raft`.
    pub fn new(raft: Arc<ClusterRaft>) -> Self {
        Self { raft }
    }

    /// Wrap into the tonic service type.
    pub fn into_service(self) -> RaftServiceServer<Self> {
        RaftServiceServer::new(self)
    }
}

fn parse<T: DeserializeOwned>(data: &[u8]) -> Result<T, Status> {
    serde_json::from_slice(data).map_err(|e| Status::invalid_argument(e.to_string()))
}

fn render<T: Serialize>(value: &T) -> Result<Vec<u8>, Status> {
    serde_json::to_vec(value).map_err(|e| Status::internal(e.to_string()))
}

/// The local Raft core has stopped; peers should treat this node as down.
fn engine_stopped(e: impl std::fmt::Display) -> Status {
    Status::unavailable(format!("raft core stopped: {}", e))
}

#[tonic::async_trait]
impl RaftService for RaftServer {
    async fn append_entries(
        &self,
        request: Request<AppendEntriesRequest>,
    ) -> Result<Response<AppendEntriesResponse>, Status> {
        let req: RaftAppendRequest<TypeConfig> = parse(&request.into_inner().data)?;
        let resp = self
            .raft
            .append_entries(req)
            .await
            .map_err(engine_stopped)?;

        Ok(Response::new(AppendEntriesResponse {
            data: render(&resp)?,
        }))
    }

    async fn request_vote(
        &self,
        request: Request<VoteRequest>,
    ) -> Result<Response<VoteResponse>, Status> {
        let req: RaftVoteRequest<ClusterNodeId> = parse(&request.into_inner().data)?;
        tracing::debug!(vote = %req.vote, "received vote request");
        let resp = self.raft.vote(req).await.map_err(engine_stopped)?;

        Ok(Response::new(VoteResponse {
            data: render(&resp)?,
        }))
    }

    async fn install_snapshot(
        &self,
        request: Request<InstallSnapshotRequest>,
    ) -> Result<Response<InstallSnapshotResponse>, Status> {
        let req: RaftSnapshotRequest<TypeConfig> = parse(&request.into_inner().data)?;
        let resp = self
            .raft
            .install_snapshot(req)
            .await
            .map_err(|e| Status::internal(e.to_string()))?;

        Ok(Response::new(InstallSnapshotResponse {
            data: render(&resp)?,
        }))
    }
}

//! Cluster membership handlers.

use crate::api::error::ApiError;
use crate::api::request::{self, BoxError};
use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response};
use kvd_cluster::JoinRequest;
use std::sync::Arc;

/// POST /join
///
/// Admit the sender as a voter. Any failure, including this node not being
/// the leader, is reported as 400 so the joiner retries.
pub async fn join<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let body: JoinRequest = match request::read_body_json(req).await {
        Ok(b) => b,
        Err(e) => return e.into_response(),
    };

    tracing::info!(
        node_id = body.id,
        addr = %body.address,
        "received join request"
    );

    match state.coordinator.admit(body).await {
        Ok(()) => response::success(),
        Err(e) => ApiError::join_failed(e).into_response(),
    }
}

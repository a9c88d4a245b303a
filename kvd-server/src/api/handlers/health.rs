//! Health and status endpoint handlers.

use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use std::sync::Arc;

/// GET /health
///
/// Returns 200 OK while the gateway is serving.
pub async fn get_health(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "status": "healthy",
        "service": "kvd",
        "name": state.name,
    });

    response::ok(&body)
}

/// GET /status
///
/// Returns the node's Raft view: role, term, leader, log progress and
/// membership.
pub async fn get_status(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let status = state.node.status();
    let keys = state.node.state_machine().len().await;

    let body = serde_json::json!({
        "status": "running",
        "service": "kvd",
        "name": state.name,
        "uptime_seconds": state.uptime_secs(),
        "keys": keys,
        "raft": status,
    });

    response::ok(&body)
}

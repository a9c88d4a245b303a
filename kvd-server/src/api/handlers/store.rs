//! Key-value store handlers.
//!
//! Reads are served from the local replica and may lag the leader. Writes
//! return once the command is committed and applied on this node.

use crate::api::error::ApiError;
use crate::api::request::{self, BoxError};
use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response};
use serde::Deserialize;
use std::sync::Arc;

/// Body of `POST /store`.
#[derive(Debug, Deserialize)]
struct SetRequest {
    key: String,
    value: String,
}

/// GET /store
///
/// Full map held by the local replica.
pub async fn list(state: Arc<AppState>) -> Response<Full<Bytes>> {
    response::ok(&state.node.get_all().await)
}

/// GET /store/{key}
pub async fn get_one(state: Arc<AppState>, key: &str) -> Response<Full<Bytes>> {
    let key = match request::decode_key(key) {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };

    match state.node.get(&key).await {
        Some(value) => response::ok(&serde_json::json!({
            "key": key,
            "value": value
        })),
        None => ApiError::not_found("not found").into_response(),
    }
}

/// POST /store
///
/// Replicate a write of `value` under `key`.
pub async fn set<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let body: SetRequest = match request::read_body_json(req).await {
        Ok(b) => b,
        Err(e) => return e.into_response(),
    };

    if body.key.is_empty() {
        return ApiError::bad_request("key is required").into_response();
    }

    match state.node.set(body.key, body.value).await {
        Ok(_) => response::success(),
        Err(e) => {
            tracing::debug!(error = %e, "write rejected");
            ApiError::from(e).into_response()
        }
    }
}

/// DELETE /store/{key}
///
/// Replicate removal of `key`. Removing an absent key succeeds.
pub async fn delete(state: Arc<AppState>, key: &str) -> Response<Full<Bytes>> {
    let key = match request::decode_key(key) {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };

    match state.node.delete(key).await {
        Ok(_) => response::success(),
        Err(e) => {
            tracing::debug!(error = %e, "delete rejected");
            ApiError::from(e).into_response()
        }
    }
}

//! Request routing for the API.
//!
//! Routes requests to handlers based on method and path.

use super::error::ApiError;
use super::handlers;
use super::request::BoxError;
use super::response;
use super::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

const STORE_PREFIX: &str = "/store/";

/// Route an incoming request to the appropriate handler.
pub async fn route<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    tracing::debug!(method = %method, path = %path, "Routing request");

    let response = match (method, path.as_str()) {
        // Store endpoints
        (Method::GET, "/store") => handlers::store::list(state).await,
        (Method::POST, "/store") => handlers::store::set(req, state).await,
        (_, "/store") => ApiError::method_not_allowed().into_response(),
        (method, p) if p.starts_with(STORE_PREFIX) => {
            route_store_key(method, state, &p[STORE_PREFIX.len()..]).await
        }

        // Cluster endpoints
        (Method::POST, "/join") => handlers::cluster::join(req, state).await,
        (Method::GET, "/health") => handlers::health::get_health(state).await,
        (Method::GET, "/status") => handlers::health::get_status(state).await,
        (_, "/join" | "/health" | "/status") => ApiError::method_not_allowed().into_response(),

        // Not found
        _ => response::route_not_found(),
    };

    Ok(response)
}

/// Route requests under /store/{key}.
async fn route_store_key(
    method: Method,
    state: Arc<AppState>,
    key: &str,
) -> Response<Full<Bytes>> {
    match method {
        Method::GET => handlers::store::get_one(state, key).await,
        Method::DELETE => handlers::store::delete(state, key).await,
        _ => ApiError::method_not_allowed().into_response(),
    }
}

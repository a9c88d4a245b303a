//! Request body and path helpers.

use super::error::ApiError;
use http_body_util::{BodyExt, Limited};
use hyper::Request;
use hyper::body::Body;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

/// Largest request body accepted by the gateway.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Boxed error produced by a body stream.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Read the whole body and parse it as JSON.
pub async fn read_body_json<T, B>(req: Request<B>) -> Result<T, ApiError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: Into<BoxError>,
{
    let bytes = Limited::new(req.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read body: {}", e)))?
        .to_bytes();

    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {}", e)))
}

/// Decode a key taken from the request path.
///
/// Keys are percent-decoded and must be non-empty UTF-8.
pub fn decode_key(raw: &str) -> Result<String, ApiError> {
    let key = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ApiError::bad_request("key is not valid UTF-8"))?;
    if key.is_empty() {
        return Err(ApiError::bad_request("key is required"));
    }
    Ok(key.into_owned())
}

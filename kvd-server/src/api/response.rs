//! JSON response builders for the API.

use bytes::Bytes;
use http_body_util::Full;
use hyper::http::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Build a JSON response with status code.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, json) = match serde_json::to_vec(body) {
        Ok(json) => (status, json),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({
                "message": format!("serialization error: {}", e),
                "code": "internal",
            })
            .to_string()
            .into_bytes(),
        ),
    };

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Build a 200 OK JSON response.
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build the `{"message": "success"}` acknowledgement.
pub fn success() -> Response<Full<Bytes>> {
    ok(&serde_json::json!({ "message": "success" }))
}

/// Build a 404 Not Found response for an unknown route.
pub fn route_not_found() -> Response<Full<Bytes>> {
    super::error::ApiError::not_found("route not found").into_response()
}

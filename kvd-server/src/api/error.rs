//! API error types and ClusterError → HTTP status mapping.

use super::response;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use kvd_cluster::{ClusterError, ClusterNodeId};
use serde::Serialize;

/// Leader known to a node that refused a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderHint {
    /// Leader's Raft node id.
    pub id: ClusterNodeId,
    /// Leader's Raft address, if known.
    pub address: Option<String>,
}

/// API error with HTTP status code and error code.
#[derive(Debug)]
pub struct ApiError {
    /// Machine-readable error code (e.g., "not_leader").
    pub code: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// HTTP status code.
    pub status: StatusCode,
    /// Leader to retry against, for writes refused by a follower.
    pub leader: Option<LeaderHint>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    leader: Option<&'a LeaderHint>,
}

impl ApiError {
    /// Create a new API error.
    pub fn new(code: &'static str, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            leader: None,
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message, StatusCode::BAD_REQUEST)
    }

    /// Create a 404 Not Found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message, StatusCode::NOT_FOUND)
    }

    /// Create a 405 Method Not Allowed error.
    pub fn method_not_allowed() -> Self {
        Self::new(
            "method_not_allowed",
            "method not allowed",
            StatusCode::METHOD_NOT_ALLOWED,
        )
    }

    /// Create a 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Recast a failed admission as a 400, keeping any leader hint.
    pub fn join_failed(err: ClusterError) -> Self {
        let mut api_err = Self::from(err);
        api_err.code = "join_failed";
        api_err.status = StatusCode::BAD_REQUEST;
        api_err
    }

    /// Convert to HTTP response.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let body = ErrorBody {
            message: &self.message,
            code: self.code,
            leader: self.leader.as_ref(),
        };
        response::json_response(self.status, &body)
    }
}

impl From<ClusterError> for ApiError {
    fn from(err: ClusterError) -> Self {
        let message = err.to_string();

        match err {
            ClusterError::NotLeader {
                leader,
                leader_addr,
            } => Self {
                code: "not_leader",
                message,
                status: StatusCode::SERVICE_UNAVAILABLE,
                leader: leader.map(|id| LeaderHint {
                    id,
                    address: leader_addr,
                }),
            },
            ClusterError::Timeout { .. } => {
                Self::new("timeout", message, StatusCode::GATEWAY_TIMEOUT)
            }
            ClusterError::AdmitRejected { .. } | ClusterError::JoinRejected { .. } => {
                Self::new("join_failed", message, StatusCode::BAD_REQUEST)
            }
            _ => Self::internal(message),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

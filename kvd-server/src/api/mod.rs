//! HTTP gateway for clients and joining nodes.
//!
//! # Endpoints
//!
//! ## Store
//! - `GET /store` - Copy of the local replica's map
//! - `GET /store/{key}` - One key from the local replica
//! - `POST /store` - Replicate a `{"key", "value"}` write
//! - `DELETE /store/{key}` - Replicate removal of a key
//!
//! ## Cluster
//! - `POST /join` - Admit a node as a voter
//! - `GET /health` - Liveness check
//! - `GET /status` - Raft role, leader, log progress and members
//!
//! Writes only succeed on the leader. Other nodes answer
//! `503 Service Unavailable` with the leader they know of:
//!
//! ```text
//! {"message": "...", "code": "not_leader", "leader": {"id": 1, "address": "127.0.0.1:3001"}}
//! ```

mod error;
mod handlers;
mod request;
mod response;
mod router;
mod server;
mod state;

pub use error::{ApiError, LeaderHint};
pub use router::route;
pub use server::{ApiServer, ServerConfig};
pub use state::AppState;

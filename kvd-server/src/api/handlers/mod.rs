//! Request handlers for API endpoints.

pub mod cluster;
pub mod health;
pub mod store;

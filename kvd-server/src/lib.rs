//! kvd node process.
//!
//! Wires a [`kvd_cluster::KvNode`] to its configuration file, a logging
//! subscriber and the HTTP gateway, and decides at start whether the node
//! bootstraps a cluster or joins an existing one.

pub mod api;
pub mod config;
pub mod diagnostics;
pub mod observability;
pub mod startup;

pub use config::{ConfigError, NodeConfig};
pub use startup::{Node, run};

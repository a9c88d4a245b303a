//! Types produced by the state machine.

use crate::types::ClusterSnapshotMeta;
use serde::{Deserialize, Serialize};

/// Response from applying a log entry.
///
/// Blank and membership entries produce the default response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvResponse {
    /// The value the key held before the command, if any.
    pub previous: Option<String>,
}

impl KvResponse {
    /// Response for an entry that touched no key.
    pub fn none() -> Self {
        Self::default()
    }

    /// Response carrying the prior value of the written key.
    pub fn previous(previous: Option<String>) -> Self {
        Self { previous }
    }
}

/// Snapshot held by the state machine.
#[derive(Debug, Clone)]
pub struct StoredSnapshot {
    /// Snapshot metadata.
    pub meta: ClusterSnapshotMeta,
    /// JSON encoded key-value map.
    pub data: Vec<u8>,
}

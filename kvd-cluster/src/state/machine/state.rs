//! The replicated key-value state.

use crate::types::{ClusterLogId, ClusterStoredMembership};
use std::collections::BTreeMap;

/// State owned by the state machine.
///
/// Only `values` is part of a snapshot payload. The applied log id and the
/// membership travel in the snapshot metadata instead.
#[derive(Debug, Default, Clone)]
pub struct KvState {
    /// The key-value map.
    pub values: BTreeMap<String, String>,
    /// Last applied log ID.
    pub last_applied_log: Option<ClusterLogId>,
    /// Last membership configuration.
    pub last_membership: ClusterStoredMembership,
}

/// Serialize the map as a JSON object.
pub fn encode_values(values: &BTreeMap<String, String>) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(values)
}

/// Parse a JSON object produced by [`encode_values`].
pub fn decode_values(bytes: &[u8]) -> Result<BTreeMap<String, String>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

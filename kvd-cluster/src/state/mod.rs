//! Replicated key-value state machine.
//!
//! The state machine receives committed log entries carrying encoded
//! [`Command`](crate::command::Command)s and applies them to an ordered map.
//! Every replica applies the same commands in the same order, so every
//! replica converges on the same map.

mod machine;
mod snapshot;

pub use machine::{KvResponse, KvStateMachine, StoredSnapshot};
pub use snapshot::SnapshotStore;

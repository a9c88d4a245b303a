//! Raft state machine for the key-value map.
//!
//! ## Module Structure
//!
//! - `types`: Apply responses and the in-memory snapshot
//! - `state`: The replicated map and its snapshot encoding
//! - `apply`: Command application logic
//! - `traits`: OpenRaft trait implementations

mod apply;
mod state;
mod traits;
mod types;

pub use types::{KvResponse, StoredSnapshot};

use state::{KvState, decode_values, encode_values};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use tokio::sync::RwLock;

use super::snapshot::SnapshotStore;

/// The Raft state machine.
///
/// Holds the replicated map and the latest snapshot. Reads never fail and
/// never block on the consensus engine, only on the state lock.
#[derive(Debug, Default)]
pub struct KvStateMachine {
    /// The replicated state.
    state: RwLock<KvState>,
    /// Snapshot index counter.
    snapshot_idx: AtomicU64,
    /// Current snapshot.
    current_snapshot: RwLock<Option<StoredSnapshot>>,
    /// Where snapshots are persisted, if anywhere.
    store: Option<SnapshotStore>,
}

impl KvStateMachine {
    /// Create an empty, memory-only state machine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a state machine that persists snapshots under `dir`.
    ///
    /// A previously saved snapshot is loaded back, restoring the map, the
    /// applied log id and the membership it captured.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let store = SnapshotStore::open(dir)?;
        let mut state = KvState::default();

        let current = store.load()?;
        if let Some(snapshot) = &current {
            state.values = decode_values(&snapshot.data)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            state.last_applied_log = snapshot.meta.last_log_id;
            state.last_membership = snapshot.meta.last_membership.clone();
            tracing::info!(
                snapshot_id = %snapshot.meta.snapshot_id,
                keys = state.values.len(),
                "loaded snapshot from disk"
            );
        }

        Ok(Self {
            state: RwLock::new(state),
            snapshot_idx: AtomicU64::new(0),
            current_snapshot: RwLock::new(current),
            store: Some(store),
        })
    }

    /// Read one key from the local replica.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.state.read().await.values.get(key).cloned()
    }

    /// Copy of the whole local map.
    pub async fn get_all(&self) -> BTreeMap<String, String> {
        self.state.read().await.values.clone()
    }

    /// Number of keys in the local map.
    pub async fn len(&self) -> usize {
        self.state.read().await.values.len()
    }

    /// Whether the local map is empty.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.values.is_empty()
    }

    /// Serialize the whole map as a JSON object.
    pub async fn snapshot(&self) -> Result<Vec<u8>, serde_json::Error> {
        let state = self.state.read().await;
        encode_values(&state.values)
    }

    /// Replace the map with the one encoded in `bytes`.
    ///
    /// The input is parsed before the lock is taken; on error the current
    /// map is left untouched.
    pub async fn restore(&self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        let staged = decode_values(bytes)?;
        self.state.write().await.values = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, EncodedCommand, encode};
    use crate::types::{ClusterEntry, ClusterLogId};
    use openraft::storage::RaftStateMachine;
    use openraft::{CommittedLeaderId, EntryPayload, RaftSnapshotBuilder};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn log_id(index: u64) -> ClusterLogId {
        ClusterLogId::new(CommittedLeaderId::new(1, 1), index)
    }

    fn normal(index: u64, command: Command) -> ClusterEntry {
        ClusterEntry {
            log_id: log_id(index),
            payload: EntryPayload::Normal(encode(&command).expect("encode")),
        }
    }

    async fn apply_all(sm: &mut Arc<KvStateMachine>, commands: Vec<Command>) {
        let entries: Vec<ClusterEntry> = commands
            .into_iter()
            .enumerate()
            .map(|(i, c)| normal(i as u64 + 1, c))
            .collect();
        sm.apply(entries).await.expect("apply");
    }

    #[tokio::test]
    async fn apply_updates_map_and_applied_log() {
        let mut sm = Arc::new(KvStateMachine::new());
        apply_all(
            &mut sm,
            vec![
                Command::set("a", "1"),
                Command::set("a", "2"),
                Command::set("b", "3"),
                Command::delete("b"),
            ],
        )
        .await;

        assert_eq!(sm.get("a").await.as_deref(), Some("2"));
        assert_eq!(sm.get("b").await, None);
        assert_eq!(sm.len().await, 1);

        let (applied, _) = sm.applied_state().await.expect("applied state");
        assert_eq!(applied, Some(log_id(4)));
    }

    #[tokio::test]
    async fn blank_entries_are_no_ops() {
        let mut sm = Arc::new(KvStateMachine::new());
        let responses = sm
            .apply(vec![ClusterEntry {
                log_id: log_id(1),
                payload: EntryPayload::Blank,
            }])
            .await
            .expect("apply");

        assert_eq!(responses, vec![KvResponse::none()]);
        assert!(sm.is_empty().await);
        let (applied, _) = sm.applied_state().await.expect("applied state");
        assert_eq!(applied, Some(log_id(1)));
    }

    #[tokio::test]
    async fn corrupt_entry_fails_without_mutation() {
        let mut sm = Arc::new(KvStateMachine::new());
        apply_all(&mut sm, vec![Command::set("a", "1")]).await;

        let corrupt = ClusterEntry {
            log_id: log_id(2),
            payload: EntryPayload::Normal(EncodedCommand::from_bytes(
                br#"{"op":"bogus","key":"a"}"#.to_vec(),
            )),
        };
        assert!(sm.apply(vec![corrupt]).await.is_err());

        assert_eq!(sm.get_all().await.len(), 1);
        assert_eq!(sm.get("a").await.as_deref(), Some("1"));
        let (applied, _) = sm.applied_state().await.expect("applied state");
        assert_eq!(applied, Some(log_id(1)));
    }

    #[tokio::test]
    async fn get_all_returns_a_copy() {
        let mut sm = Arc::new(KvStateMachine::new());
        apply_all(&mut sm, vec![Command::set("a", "1")]).await;

        let mut copy = sm.get_all().await;
        copy.insert("b".to_string(), "2".to_string());

        assert_eq!(sm.get("b").await, None);
    }

    #[tokio::test]
    async fn snapshot_restore_round_trip() {
        let cases: Vec<Vec<(&str, &str)>> = vec![
            vec![],
            vec![("only", "one")],
            vec![("a", "1"), ("b", "2"), ("c", "3"), ("", "empty key")],
            vec![("日本", "東京"), ("emoji", "🚀✨"), ("ключ", "")],
        ];

        for case in cases {
            let mut source = Arc::new(KvStateMachine::new());
            apply_all(
                &mut source,
                case.iter().map(|(k, v)| Command::set(*k, *v)).collect(),
            )
            .await;

            let bytes = source.snapshot().await.expect("snapshot");
            let target = KvStateMachine::new();
            target.restore(&bytes).await.expect("restore");

            assert_eq!(target.get_all().await, source.get_all().await);
        }
    }

    #[tokio::test]
    async fn snapshot_round_trip_many_keys() {
        let mut source = Arc::new(KvStateMachine::new());
        apply_all(
            &mut source,
            (0..1000)
                .map(|i| Command::set(format!("key-{i}"), format!("value-{i}")))
                .collect(),
        )
        .await;

        let bytes = source.snapshot().await.expect("snapshot");
        let target = KvStateMachine::new();
        target.restore(&bytes).await.expect("restore");

        assert_eq!(target.len().await, 1000);
        assert_eq!(target.get("key-999").await.as_deref(), Some("value-999"));
    }

    #[tokio::test]
    async fn restore_of_corrupt_input_keeps_map() {
        let mut sm = Arc::new(KvStateMachine::new());
        apply_all(&mut sm, vec![Command::set("a", "1")]).await;

        assert!(sm.restore(b"[1, 2, 3]").await.is_err());
        assert!(sm.restore(b"{\"a\": 5}").await.is_err());

        assert_eq!(sm.get("a").await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn built_snapshot_installs_on_another_replica() {
        let mut source = Arc::new(KvStateMachine::new());
        apply_all(&mut source, vec![Command::set("x", "1"), Command::set("y", "2")]).await;

        let mut builder = source.get_snapshot_builder().await;
        let snapshot = builder.build_snapshot().await.expect("build snapshot");
        assert_eq!(snapshot.meta.last_log_id, Some(log_id(2)));

        let mut target = Arc::new(KvStateMachine::new());
        target
            .install_snapshot(&snapshot.meta, snapshot.snapshot)
            .await
            .expect("install snapshot");

        assert_eq!(target.get_all().await, source.get_all().await);
        let (applied, _) = target.applied_state().await.expect("applied state");
        assert_eq!(applied, Some(log_id(2)));

        let current = target
            .get_current_snapshot()
            .await
            .expect("current snapshot")
            .expect("snapshot present");
        assert_eq!(current.meta.snapshot_id, snapshot.meta.snapshot_id);
    }

    #[tokio::test]
    async fn snapshots_survive_reopen() {
        let temp_dir = TempDir::new().expect("create temp dir");

        {
            let mut sm = Arc::new(KvStateMachine::open(temp_dir.path()).expect("open"));
            apply_all(&mut sm, vec![Command::set("persisted", "yes")]).await;
            let mut builder = sm.get_snapshot_builder().await;
            builder.build_snapshot().await.expect("build snapshot");
        }

        let mut sm = Arc::new(KvStateMachine::open(temp_dir.path()).expect("reopen"));
        assert_eq!(sm.get("persisted").await.as_deref(), Some("yes"));
        let (applied, _) = sm.applied_state().await.expect("applied state");
        assert_eq!(applied, Some(log_id(1)));
        assert!(sm.get_current_snapshot().await.expect("current").is_some());
    }
}
